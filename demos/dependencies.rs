use rulegraph::{EvaluationContext, EvaluationError, RulesGraph};

type Ctx = EvaluationContext<f64, f64>;

fn result_of(ctx: &Ctx, id: &str) -> Result<f64, EvaluationError> {
    Ok(ctx.rule(id)?.result()?.unwrap_or_default())
}

fn multiples<G>(fourfold: G) -> RulesGraph<f64, f64>
where
    G: Fn(&Ctx) -> Result<f64, EvaluationError> + Send + Sync + 'static,
{
    RulesGraph::new()
        .add(|r| r.with_id("double").try_then(|ctx: &Ctx| Ok(result_of(ctx, "identity")? * 2.0)))
        .add(|r| {
            r.with_id("inverse")
                .when(|ctx: &Ctx| *ctx.facts() != 0.0)
                .then(|ctx: &Ctx| 1.0 / ctx.facts())
        })
        .add(|r| {
            r.with_id("triple")
                .try_then(|ctx: &Ctx| Ok(result_of(ctx, "quintuple")? - result_of(ctx, "double")?))
        })
        .add(|r| {
            r.with_id("quintuple")
                .try_then(|ctx: &Ctx| Ok(result_of(ctx, "fourfold")? + ctx.facts()))
        })
        .add(|r| r.with_id("identity").then(|ctx: &Ctx| *ctx.facts()))
        .add(move |r| r.with_id("fourfold").try_then(fourfold))
        .add(|r| {
            r.with_id("absolute")
                .when(|ctx: &Ctx| *ctx.facts() >= 0.0)
                .then(|ctx: &Ctx| *ctx.facts())
                .or_else(|ctx: &Ctx| -ctx.facts())
        })
}

fn main() {
    let graph = multiples(|ctx: &Ctx| Ok(4.0 * ctx.facts()));

    let all = graph.apply_all(-2.0).expect("rules failed");
    let mut ids: Vec<&String> = all.keys().collect();
    ids.sort();
    for id in ids {
        println!("{id:>10} = {}", all[id]);
    }

    // The dependencies discovered while computing `triple`.
    let ctx = graph.session(-2.0).expect("duplicate rule ids");
    let triple = ctx.rule("triple").and_then(|r| r.result()).expect("rules failed");
    println!("\ntriple = {triple:?}, recorded dependencies:");
    for (from, to) in ctx.session().graph().edges() {
        println!("  {from} -> {to}");
    }

    // fourfold defined through triple closes a loop:
    // fourfold -> triple -> quintuple -> fourfold
    let cyclic = multiples(|ctx: &Ctx| Ok(result_of(ctx, "triple")? - ctx.facts()));
    match cyclic.apply_all(-2.0) {
        Ok(all) => println!("\nunexpected success: {all:?}"),
        Err(err) => {
            println!("\n{err}");
            if let Some(cycle) = err.cyclic_dependency() {
                println!("  caused by {cycle}");
            }
        }
    }
}
