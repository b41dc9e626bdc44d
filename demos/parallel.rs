use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rulegraph::{EvaluationContext, RulesEngine, RulesGraph};

type Ctx = EvaluationContext<u64, u64>;

/// A graph of slow rules: `sum` needs every `part`, each `part` needs `seed`.
fn build(parts: u64) -> RulesGraph<u64, u64> {
    let mut graph = RulesGraph::new().add(|r| {
        r.with_id("seed").then(|ctx: &Ctx| {
            thread::sleep(Duration::from_millis(20));
            *ctx.facts()
        })
    });
    for i in 0..parts {
        graph = graph.add(move |r| {
            r.with_id(format!("part{i}")).try_then(move |ctx: &Ctx| {
                thread::sleep(Duration::from_millis(10));
                Ok(ctx.rule("seed")?.result()?.unwrap_or_default() + i)
            })
        });
    }
    graph.add(move |r| {
        r.with_id("sum").with_priority(-1).try_then(move |ctx: &Ctx| {
            let mut sum = 0;
            for i in 0..parts {
                sum += ctx.rule(&format!("part{i}"))?.result()?.unwrap_or_default();
            }
            Ok(sum)
        })
    })
}

fn main() {
    let sequential = build(16);
    let parallel = build(16).set_rules_engine(RulesEngine::parallel);

    for (name, graph) in [("sequential", &sequential), ("parallel", &parallel)] {
        let start = Instant::now();
        let all = graph.apply_all(100).expect("rules failed");
        println!("{name:>10}: sum = {} in {:?}", all["sum"], start.elapsed());
    }

    // One graph shared by many threads, one session per call.
    let shared = Arc::new(build(4));
    let handles: Vec<_> = (0..4_u64)
        .map(|t| {
            let graph = Arc::clone(&shared);
            thread::spawn(move || {
                let sum = graph.apply_all(t * 1000).expect("rules failed")["sum"];
                println!("Thread {t}: {sum}");
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
