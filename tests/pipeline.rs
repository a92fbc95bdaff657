use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use switchboard::core::access::Invoker;
use switchboard::core::descriptor::CommandDescriptor;
use switchboard::core::dispatch::Dispatcher;
use switchboard::core::envelope::{PipeEnvelope, Tag};
use switchboard::core::error::{DispatchError, ErrorKind};
use switchboard::core::extract::ArgTemplate;
use switchboard::core::handler::{CommandContext, handler_fn};
use switchboard::core::invocation::Invocation;
use switchboard::core::option::OptionSpec;
use switchboard::core::pipeline::split_stages;
use switchboard::core::registry::RegistryBuilder;

#[derive(Default)]
struct Counters {
    first: AtomicUsize,
    second: AtomicUsize,
    third: AtomicUsize,
}

fn text_stage(name: &str, counter: impl Fn() + Send + Sync + 'static) -> CommandDescriptor {
    CommandDescriptor::new(name)
        .option(OptionSpec::string("text"))
        .template(ArgTemplate::remainder("text"))
        .accepts(Tag::TEXT)
        .produces(Tag::TEXT)
        .handler(handler_fn(move |ctx: CommandContext| {
            counter();
            async move {
                let text = ctx.text_input("text").unwrap_or_default();
                Ok(PipeEnvelope::ok(text.clone()).with_data(Tag::TEXT, text))
            }
        }))
}

fn ordering_dispatcher(counters: &Arc<Counters>, fail_with_err: bool) -> Dispatcher {
    let mut b = RegistryBuilder::new();
    let c = Arc::clone(counters);
    b.register(text_stage("one", move || {
        c.first.fetch_add(1, Ordering::SeqCst);
    }))
    .unwrap();

    let c = Arc::clone(counters);
    b.register(
        CommandDescriptor::new("two")
            .accepts(Tag::TEXT)
            .produces(Tag::TEXT)
            .handler(handler_fn(move |_ctx: CommandContext| {
                c.second.fetch_add(1, Ordering::SeqCst);
                async move {
                    if fail_with_err {
                        anyhow::bail!("stage two exploded");
                    }
                    Ok(PipeEnvelope::fail("stage two refused"))
                }
            })),
    )
    .unwrap();

    let c = Arc::clone(counters);
    b.register(text_stage("three", move || {
        c.third.fetch_add(1, Ordering::SeqCst);
    }))
    .unwrap();
    Dispatcher::new(Arc::new(b.build().unwrap()))
}

#[tokio::test]
async fn failing_middle_stage_stops_the_chain() {
    let counters = Arc::new(Counters::default());
    let d = ordering_dispatcher(&counters, false);
    let out = d
        .dispatch(Invocation::text("one hi | two | three"), &Invoker::new("u"))
        .await
        .expect("business failure is an envelope, not a dispatch error");
    assert!(out.error);
    assert_eq!(out.message.as_deref(), Some("stage two refused"));
    assert_eq!(counters.first.load(Ordering::SeqCst), 1);
    assert_eq!(counters.second.load(Ordering::SeqCst), 1);
    assert_eq!(counters.third.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn handler_error_becomes_handler_failure() {
    let counters = Arc::new(Counters::default());
    let d = ordering_dispatcher(&counters, true);
    let err = d
        .dispatch(Invocation::text("one hi | two | three"), &Invoker::new("u"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::HandlerFailure {
            command: "two".into(),
            message: "stage two exploded".into(),
        }
    );
    assert_eq!(counters.third.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn incompatible_tags_rejected_before_downstream_runs() {
    let ran = Arc::new(AtomicBool::new(false));
    let mut b = RegistryBuilder::new();
    b.register(
        CommandDescriptor::new("count")
            .produces(Tag::NUMBER)
            .handler(handler_fn(|_ctx: CommandContext| async {
                Ok(PipeEnvelope::silent().with_data(Tag::NUMBER, 3i64))
            })),
    )
    .unwrap();
    let flag = Arc::clone(&ran);
    b.register(text_stage("shout", move || flag.store(true, Ordering::SeqCst)))
        .unwrap();
    let d = Dispatcher::new(Arc::new(b.build().unwrap()));

    let err = d
        .dispatch(Invocation::text("count | shout"), &Invoker::new("u"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PipeIncompatible);
    assert!(!ran.load(Ordering::SeqCst));
    let DispatchError::PipeIncompatible {
        upstream,
        produces,
        downstream,
        ..
    } = err
    else {
        unreachable!();
    };
    assert_eq!(upstream, "count");
    assert_eq!(downstream, "shout");
    assert!(produces.contains(&"number".to_string()));
}

#[tokio::test]
async fn quoted_delimiter_stays_in_the_stage() {
    assert_eq!(
        split_stages(r#"cmd "a | b" | other"#, '|').unwrap(),
        vec![r#"cmd "a | b""#, "other"]
    );

    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut b = RegistryBuilder::new();
    b.register(text_stage("cmd", || {})).unwrap();
    let log = Arc::clone(&seen);
    b.register(
        CommandDescriptor::new("other")
            .accepts(Tag::TEXT)
            .handler(handler_fn(move |ctx: CommandContext| {
                if let Ok(mut seen) = log.lock() {
                    seen.push(ctx.piped_text().unwrap_or_default());
                }
                async { Ok(PipeEnvelope::ok("done")) }
            })),
    )
    .unwrap();
    let d = Dispatcher::new(Arc::new(b.build().unwrap()));
    d.dispatch(Invocation::text(r#"cmd "a | b" | other"#), &Invoker::new("u"))
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![r#""a | b""#.to_string()]);
}

#[tokio::test]
async fn later_stage_resolves_only_after_earlier_ones_ran() {
    let counters = Arc::new(Counters::default());
    let d = ordering_dispatcher(&counters, false);
    let err = d
        .dispatch(Invocation::text("one hi | nosuch"), &Invoker::new("u"))
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::UnknownCommand { name: "nosuch".into() });
    assert_eq!(counters.first.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_handler_is_contained() {
    let mut b = RegistryBuilder::new();
    b.register(
        CommandDescriptor::new("boom").handler(handler_fn(|_ctx: CommandContext| async {
            if true {
                panic!("kaboom");
            }
            Ok(PipeEnvelope::silent())
        })),
    )
    .unwrap();
    b.register(text_stage("echo", || {})).unwrap();
    let d = Dispatcher::new(Arc::new(b.build().unwrap()));

    let err = d
        .dispatch(Invocation::text("boom"), &Invoker::new("u"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandlerFailure);
    assert!(err.to_string().contains("kaboom"));

    // The dispatcher is still usable afterwards.
    let out = d
        .dispatch(Invocation::text("echo still alive"), &Invoker::new("u"))
        .await
        .unwrap();
    assert_eq!(out.message.as_deref(), Some("still alive"));
}

#[tokio::test]
async fn downstream_sees_only_accepted_tags_and_pipe_flag() {
    let observed = Arc::new(Mutex::new(None));
    let mut b = RegistryBuilder::new();
    b.register(
        CommandDescriptor::new("both")
            .produces(Tag::TEXT)
            .produces(Tag::NUMBER)
            .handler(handler_fn(|ctx: CommandContext| async move {
                assert!(ctx.will_be_piped);
                Ok(PipeEnvelope::silent()
                    .with_data(Tag::TEXT, "seven")
                    .with_data(Tag::NUMBER, 7i64))
            })),
    )
    .unwrap();
    let slot = Arc::clone(&observed);
    b.register(
        CommandDescriptor::new("numbers")
            .accepts(Tag::NUMBER)
            .handler(handler_fn(move |ctx: CommandContext| {
                if let Ok(mut slot) = slot.lock() {
                    *slot = Some((ctx.piped.clone(), ctx.will_be_piped));
                }
                async { Ok(PipeEnvelope::ok("ok")) }
            })),
    )
    .unwrap();
    let d = Dispatcher::new(Arc::new(b.build().unwrap()));
    d.dispatch(Invocation::text("both | numbers"), &Invoker::new("u"))
        .await
        .unwrap();

    let (piped, will_be_piped) = observed.lock().unwrap().clone().unwrap();
    let piped = piped.unwrap();
    assert_eq!(piped.len(), 1);
    assert!(piped.contains_key(&Tag::NUMBER));
    assert!(!will_be_piped);
}

#[tokio::test]
async fn legacy_name_link_passes_data_through() {
    let mut b = RegistryBuilder::new();
    b.register(
        CommandDescriptor::new("src")
            .pipable_to("sink")
            .handler(handler_fn(|_ctx: CommandContext| async {
                Ok(PipeEnvelope::silent().with_data(Tag::TEXT, "payload"))
            })),
    )
    .unwrap();
    b.register(CommandDescriptor::new("sink").handler(handler_fn(|ctx: CommandContext| async move {
        Ok(PipeEnvelope::ok(ctx.piped_text().unwrap_or_default()))
    })))
    .unwrap();
    let d = Dispatcher::new(Arc::new(b.build().unwrap()));
    let out = d
        .dispatch(Invocation::text("src | sink"), &Invoker::new("u"))
        .await
        .unwrap();
    assert_eq!(out.message.as_deref(), Some("payload"));

    let err = d
        .dispatch(Invocation::text("sink | src"), &Invoker::new("u"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PipeIncompatible);
}
