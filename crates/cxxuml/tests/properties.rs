//! Property tests for model construction and chain extraction

use cxxuml::build_sequence;
use cxxuml::prelude::*;
use proptest::prelude::*;

const NAMES: [&str; 6] = ["f0", "f1", "f2", "f3", "f4", "f5"];

fn call(name: &str) -> [AstEvent; 2] {
    [
        AstEvent::CallEnter {
            callee: CallableDecl::function(name),
            location: None,
            comment: None,
        },
        AstEvent::CallLeave,
    ]
}

/// One function body per caller, each calling its callees in order
fn trace(bodies: &[(usize, Vec<usize>)]) -> Vec<AstEvent> {
    let mut events = Vec::new();
    for (caller, callees) in bodies {
        events.push(AstEvent::FunctionEnter(CallableDecl::function(NAMES[*caller])));
        for callee in callees {
            events.extend(call(NAMES[*callee]));
        }
        events.push(AstEvent::FunctionLeave);
    }
    events
}

proptest! {
    #[test]
    fn calls_keep_source_order(callees in prop::collection::vec(1usize..6, 1..24)) {
        let model = build_sequence(&trace(&[(0, callees.clone())]), "ordering").unwrap();
        let f0 = model.registry().lookup_by_name("f0()").unwrap();

        let recorded: Vec<String> = model
            .get_activity(f0)
            .unwrap()
            .calls()
            .filter_map(|m| model.registry().lookup(m.to))
            .map(|p| p.full_name.clone())
            .collect();
        let expected: Vec<String> = callees.iter().map(|i| format!("{}()", NAMES[*i])).collect();
        prop_assert_eq!(recorded, expected);
    }

    #[test]
    fn chains_terminate_and_reach_the_end(
        edges in prop::collection::vec((0usize..6, 0usize..6), 1..20)
    ) {
        let mut bodies: Vec<(usize, Vec<usize>)> = Vec::new();
        for (from, to) in &edges {
            match bodies.iter_mut().find(|(caller, _)| caller == from) {
                Some((_, callees)) => callees.push(*to),
                None => bodies.push((*from, vec![*to])),
            }
        }
        let model = build_sequence(&trace(&bodies), "chains").unwrap();

        let (_, to) = edges[0];
        let Some(end) = model.registry().lookup_by_name(&format!("{}()", NAMES[to])) else {
            return Ok(());
        };
        for chain in model.get_all_from_to_message_chains(None, end) {
            prop_assert!(!chain.is_empty());
            prop_assert_eq!(chain.last().unwrap().to, end);
            // Consecutive calls connect
            for pair in chain.windows(2) {
                prop_assert_eq!(pair[0].to, pair[1].from);
            }
            // No participant is entered twice
            let mut seen = std::collections::HashSet::new();
            prop_assert!(seen.insert(chain[0].from));
            for message in &chain[..chain.len() - 1] {
                prop_assert!(seen.insert(message.to));
            }
        }
    }
}

#[test]
fn test_recursion_identity() {
    let model = build_sequence(
        &[
            vec![AstEvent::FunctionEnter(CallableDecl::function("f"))],
            call("f").to_vec(),
            vec![AstEvent::FunctionLeave],
        ]
        .concat(),
        "recursion",
    )
    .unwrap();
    let f = model.registry().lookup_by_name("f()").unwrap();
    let calls: Vec<_> = model.get_activity(f).unwrap().calls().cloned().collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].from, calls[0].to);

    // Rendering does not expand f inside itself
    let puml = cxxuml::render_sequence(&model, OutputFormat::PlantUml).unwrap();
    assert_eq!(puml.matches(" -> ").count(), 1);
}

#[test]
fn test_resolution_completeness() {
    let events = [
        vec![AstEvent::FunctionEnter(CallableDecl::function("a"))],
        call("b").to_vec(),
        vec![AstEvent::FunctionLeave, AstEvent::FunctionEnter(CallableDecl::function("b"))],
        call("c").to_vec(),
        vec![AstEvent::FunctionLeave],
    ]
    .concat();
    let model = build_sequence(&events, "resolution").unwrap();
    let a = model.registry().lookup_by_name("a()").unwrap();
    let b = model.registry().lookup_by_name("b()").unwrap();
    let c = model.registry().lookup_by_name("c()").unwrap();

    let chains = model.get_all_from_to_message_chains(Some(a), c);
    assert_eq!(chains.len(), 1);
    let hops: Vec<_> = chains[0].iter().map(|m| (m.from, m.to)).collect();
    assert_eq!(hops, vec![(a, b), (b, c)]);
}
