//! Run with `RUST_LOG=rulegraph=trace cargo run --example logging` to also
//! see the engine and session events.

use rulegraph::{CompositeRule, EvaluationContext, EvaluationError, HookableRule, RuleLogger, RulesGraph};
use tracing::Level;
use tracing_subscriber::EnvFilter;

type Ctx = EvaluationContext<u32, String>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let logged = |rule: CompositeRule<Ctx, String>| {
        HookableRule::new(rule).with_hook(RuleLogger::new().with_level(Level::INFO).log_errors(true))
    };

    let graph = RulesGraph::<u32, String>::new()
        .push(logged(
            CompositeRule::new("adult")
                .when(|ctx: &Ctx| *ctx.facts() >= 18)
                .then_return("adult".into()),
        ))
        .push(logged(
            CompositeRule::new("senior")
                .with_priority(1)
                .try_when(|ctx: &Ctx| Ok(ctx.rule("adult")?.applies()? && *ctx.facts() >= 65))
                .then_return("senior".into()),
        ))
        .push(logged(
            CompositeRule::new("implausible")
                .with_priority(2)
                .try_when(|ctx: &Ctx| {
                    if *ctx.facts() > 150 {
                        Err(EvaluationError::custom(format!("implausible age {}", ctx.facts())))
                    } else {
                        Ok(false)
                    }
                })
                .then_return("implausible".into()),
        ));

    for age in [12, 40, 70, 200] {
        match graph.apply_first(age) {
            Ok(category) => tracing::info!(age, ?category, "classified"),
            Err(err) => tracing::warn!(age, error = %err, "classification failed"),
        }
    }
}
