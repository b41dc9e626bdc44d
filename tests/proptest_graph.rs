
use proptest::prelude::*;
use proptest::sample::Index;
use rulegraph::{RuleOrder, RuleStatus, RulesEngine, Traversal};
use strategies::{arb_facts, arb_graph, arb_graph_and_order, id};

// ---------------------------------------------------------------------------
// Results match a direct computation, whatever the visiting order.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn apply_all_matches_reference(gen in arb_graph(1..12), facts in arb_facts()) {
        let order: Vec<usize> = (0..gen.len()).collect();
        let (graph, _) = gen.build(&order);
        prop_assert_eq!(graph.apply_all(facts).unwrap(), gen.expected_all(facts));
    }

    #[test]
    fn apply_first_matches_reference(gen in arb_graph(1..12), facts in arb_facts()) {
        let order: Vec<usize> = (0..gen.len()).collect();
        let (graph, _) = gen.build(&order);
        prop_assert_eq!(graph.apply_first(facts).unwrap(), gen.expected_first(facts));
    }

    #[test]
    fn visiting_order_does_not_matter(
        (gen, order) in arb_graph_and_order(),
        facts in arb_facts(),
    ) {
        let (graph, _) = gen.build(&order);
        let graph = graph.set_rules_engine(|e| e.with_order(RuleOrder::Insertion));
        prop_assert_eq!(graph.apply_all(facts).unwrap(), gen.expected_all(facts));
    }

    #[test]
    fn parallel_equals_sequential(
        (gen, order) in arb_graph_and_order(),
        facts in arb_facts(),
    ) {
        let (graph, _) = gen.build(&order);
        let sequential = graph.apply_all(facts).unwrap();
        let graph = graph.set_rules_engine(RulesEngine::parallel);
        prop_assert_eq!(graph.rules_engine().traversal(), Traversal::Parallel);
        prop_assert_eq!(graph.apply_all(facts).unwrap(), sequential);
    }
}

// ---------------------------------------------------------------------------
// Every body runs at most once per session.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn bodies_run_once_per_session(
        (gen, order) in arb_graph_and_order(),
        facts in arb_facts(),
        parallel in any::<bool>(),
    ) {
        let (graph, counters) = gen.build(&order);
        let graph = if parallel { graph.set_rules_engine(RulesEngine::parallel) } else { graph };
        graph.apply_all(facts).unwrap();

        let (applies, _) = gen.reference(facts);
        for i in 0..gen.len() {
            prop_assert_eq!(counters.condition(i), 1, "condition of {}", id(i));
            prop_assert_eq!(counters.action(i), usize::from(applies[i]), "action of {}", id(i));
        }
    }

    #[test]
    fn forcing_through_a_session_in_any_order(
        (gen, order) in arb_graph_and_order(),
        facts in arb_facts(),
    ) {
        // Rules forced in a random order, each through a fresh root handle:
        // later rules hit vertices memoized by earlier, deeper references.
        let (graph, counters) = gen.build(&order);
        let ctx = graph.session(facts).unwrap();
        let (applies, values) = gen.reference(facts);

        for &i in &order {
            let result = ctx.rule(&id(i)).unwrap().result().unwrap();
            prop_assert_eq!(result, applies[i].then_some(values[i]));
        }
        for i in 0..gen.len() {
            prop_assert!(counters.condition(i) <= 1);
            prop_assert!(counters.action(i) <= 1);
        }
        prop_assert!(ctx.session().graph().vertex_count() <= 2 * gen.len());
    }
}

// ---------------------------------------------------------------------------
// Injected back edges always surface as a cyclic dependency.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn back_edge_is_rejected(
        gen in arb_graph(2..12),
        pick in any::<Index>(),
        depth in 0_usize..4,
        facts in arb_facts(),
        parallel in any::<bool>(),
    ) {
        let Some((cyclic, lo, hi)) = gen.with_back_edge(pick, depth) else {
            return Ok(());
        };
        let order: Vec<usize> = (0..cyclic.len()).collect();
        let (graph, counters) = cyclic.build(&order);
        let graph = if parallel { graph.set_rules_engine(RulesEngine::parallel) } else { graph };

        let err = graph.apply_all(facts).unwrap_err();
        let cycle = err.cyclic_dependency();
        prop_assert!(cycle.is_some(), "unexpected error: {}", err);
        let ids = cycle.map(|c| c.rule_ids()).unwrap_or_default();
        prop_assert!(ids.contains(&id(lo).as_str()));
        prop_assert!(ids.contains(&id(hi).as_str()));
        for i in 0..cyclic.len() {
            prop_assert!(counters.condition(i) <= 1);
            prop_assert!(counters.action(i) <= 1);
        }
    }

    #[test]
    fn back_edge_after_memoized_prefix(
        gen in arb_graph(2..12),
        pick in any::<Index>(),
        depth in 0_usize..4,
        facts in arb_facts(),
    ) {
        let Some((cyclic, lo, hi)) = gen.with_back_edge(pick, depth) else {
            return Ok(());
        };
        let order: Vec<usize> = (0..cyclic.len()).collect();
        let (graph, counters) = cyclic.build(&order);
        let ctx = graph.session(facts).unwrap();

        // Settle only the conditions that never touch the cycle.
        let touches_cycle = cyclic.condition_reaches(&[lo, hi]);
        let settled: Vec<usize> = (0..cyclic.len()).filter(|&i| !touches_cycle[i]).collect();
        for &i in &settled {
            prop_assert!(ctx.rule(&id(i)).unwrap().applies().is_ok());
        }
        prop_assert_eq!(ctx.rule(&id(hi)).unwrap().current_status(), RuleStatus::Waiting);
        prop_assert_eq!(ctx.rule(&id(lo)).unwrap().current_status(), RuleStatus::Waiting);

        let err = ctx.rule(&id(hi)).unwrap().applies().unwrap_err();
        let cycle = err.cyclic_dependency();
        prop_assert!(cycle.is_some(), "unexpected error: {}", err);
        let ids = cycle.map(|c| c.rule_ids()).unwrap_or_default();
        prop_assert!(ids.contains(&id(lo).as_str()));
        prop_assert!(ids.contains(&id(hi).as_str()));

        for &i in &settled {
            prop_assert_eq!(counters.condition(i), 1, "condition of {}", id(i));
        }
        for i in 0..cyclic.len() {
            prop_assert!(counters.condition(i) <= 1);
            prop_assert!(counters.action(i) <= 1);
        }
    }

    #[test]
    fn ring_of_conditions(size in 1_usize..10, start in any::<Index>(), parallel in any::<bool>()) {
        let graph = (0..size)
            .map(|i| {
                let next = id((i + 1) % size);
                std::sync::Arc::new(
                    rulegraph::CompositeRule::new(id(i))
                        .try_when(move |ctx: &strategies::Ctx| ctx.rule(&next)?.applies())
                        .then_return(0_i64),
                ) as rulegraph::SharedRule<strategies::Ctx, i64>
            })
            .collect::<rulegraph::RulesGraph<i64, i64>>();
        let graph = if parallel { graph.set_rules_engine(RulesEngine::parallel) } else { graph };

        let err = graph.apply_all(0).unwrap_err();
        let cycle = err.cyclic_dependency().expect("cyclic root cause");
        prop_assert_eq!(cycle.rule_ids().len(), size);

        let ctx = graph.session(0).unwrap();
        let err = ctx.rule(&id(start.index(size))).unwrap().applies().unwrap_err();
        prop_assert!(err.cyclic_dependency().is_some());
    }
}
