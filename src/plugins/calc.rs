//! Arithmetic. Deployed split, so platforms see `calc-add` and `calc-mul`.
//!
//! When `b` is omitted the upstream number is used, which lets results chain:
//! `!calc add 2 3 | calc mul 4`.

use crate::core::descriptor::CommandDescriptor;
use crate::core::envelope::{PipeEnvelope, Tag};
use crate::core::error::SwitchboardError;
use crate::core::extract::ArgTemplate;
use crate::core::handler::{CommandContext, handler_fn};
use crate::core::option::OptionSpec;
use crate::core::registry::RegistryBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Mul,
}

impl Op {
    const ALL: [Op; 2] = [Op::Add, Op::Mul];

    fn name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Mul => "mul",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Op::Add => "Add two numbers",
            Op::Mul => "Multiply two numbers",
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Op::Add => a + b,
            Op::Mul => a * b,
        }
    }
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), SwitchboardError> {
    builder.register(
        CommandDescriptor::new("calc")
            .describe("Arithmetic")
            .tag(Tag::NUMBER)
            .split(Op::ALL.iter().map(|op| leaf(*op)).collect()),
    )
}

fn leaf(op: Op) -> CommandDescriptor {
    CommandDescriptor::new(op.name())
        .describe(op.describe())
        .option(OptionSpec::number("a").required())
        .option(OptionSpec::number("b"))
        .template(ArgTemplate::first_token("a", "b"))
        .accepts(Tag::NUMBER)
        .produces(Tag::NUMBER)
        .produces(Tag::TEXT)
        .handler(handler_fn(move |ctx: CommandContext| async move {
            let a = ctx.args.number("a").unwrap_or_default();
            let b = ctx
                .args
                .number("b")
                .or_else(|| ctx.piped_value(&Tag::NUMBER).and_then(|v| v.as_f64()));
            let Some(b) = b else {
                return Ok(PipeEnvelope::fail(format!(
                    "{} needs two numbers, or one number and a piped result",
                    ctx.command
                )));
            };
            let result = op.apply(a, b);
            if !result.is_finite() {
                return Ok(PipeEnvelope::fail("result is out of range"));
            }
            Ok(PipeEnvelope::ok(result.to_string())
                .with_data(Tag::NUMBER, result)
                .with_data(Tag::TEXT, result.to_string()))
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_apply() {
        assert_eq!(Op::Add.apply(2.0, 3.0), 5.0);
        assert_eq!(Op::Mul.apply(2.0, 3.0), 6.0);
    }

    #[test]
    fn exported_split() {
        let mut b = RegistryBuilder::new();
        register(&mut b).unwrap();
        let reg = b.build().unwrap();
        let names: Vec<&str> = reg.exports().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["calc-add", "calc-mul"]);
    }
}
