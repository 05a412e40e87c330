//! Integration tests for the public API

use cxxuml::prelude::*;
use cxxuml::{build_sequence, render_sequence, render_sequence_with};

fn call(callee: CallableDecl) -> [AstEvent; 2] {
    [
        AstEvent::CallEnter {
            callee,
            location: None,
            comment: None,
        },
        AstEvent::CallLeave,
    ]
}

/// `tmain` constructs an `A` and calls `A::add(int,int)`
fn constructor_and_method() -> Vec<AstEvent> {
    let mut events = vec![
        AstEvent::ClassDecl(ClassDecl::new("A")),
        AstEvent::FunctionEnter(CallableDecl::function("tmain")),
    ];
    events.extend(call(CallableDecl::method("A", "A").constructor()));
    events.extend(call(
        CallableDecl::method("A", "add")
            .with_parameters(&["int", "int"])
            .with_return_type("int"),
    ));
    events.push(AstEvent::FunctionLeave);
    events
}

#[test]
fn test_constructor_and_method_messages() {
    let model = build_sequence(&constructor_and_method(), "api").unwrap();
    let registry = model.registry();
    let tmain = registry.lookup_by_name("tmain()").unwrap();
    let ctor = registry.lookup_by_name("A::A()").unwrap();
    let add = registry.lookup_by_name("A::add(int,int)").unwrap();

    let messages = &model.get_activity(tmain).unwrap().messages;
    assert_eq!(messages.len(), 4);

    let shape: Vec<(MessageKind, ParticipantId, ParticipantId)> =
        messages.iter().map(|m| (m.kind, m.from, m.to)).collect();
    assert_eq!(
        shape,
        vec![
            (MessageKind::Call, tmain, ctor),
            (MessageKind::Return, ctor, tmain),
            (MessageKind::Call, tmain, add),
            (MessageKind::Return, add, tmain),
        ]
    );
    assert_eq!(messages[2].return_type.as_deref(), Some("int"));
    assert_eq!(messages[0].return_type.as_deref(), Some("A"));
}

#[test]
fn test_methods_render_on_their_class() {
    let model = build_sequence(&constructor_and_method(), "api").unwrap();
    let class = model.registry().lookup_by_name("A").unwrap();

    let puml = render_sequence(&model, OutputFormat::PlantUml).unwrap();
    assert!(puml.contains(&format!("participant \"A\" as {}", class.alias())));
    assert!(puml.contains(&format!("-> {} : add(int,int)", class.alias())));
    // Calls between different participants return to the caller
    assert!(puml.contains(&format!("{} --> ", class.alias())));
}

#[test]
fn test_argument_calls_come_first() {
    // a(b()) visits the call to b while the call to a is still open
    let events = vec![
        AstEvent::FunctionEnter(CallableDecl::function("tmain")),
        AstEvent::CallEnter {
            callee: CallableDecl::function("a").with_parameters(&["int"]),
            location: None,
            comment: None,
        },
        AstEvent::CallEnter {
            callee: CallableDecl::function("b").with_return_type("int"),
            location: None,
            comment: None,
        },
        AstEvent::CallLeave,
        AstEvent::CallLeave,
        AstEvent::FunctionLeave,
    ];
    let model = build_sequence(&events, "api").unwrap();
    let tmain = model.registry().lookup_by_name("tmain()").unwrap();

    let names: Vec<String> = model
        .get_activity(tmain)
        .unwrap()
        .calls()
        .filter_map(|m| model.registry().lookup(m.to))
        .map(|p| p.full_name.clone())
        .collect();
    assert_eq!(names, vec!["b()", "a(int)"]);
}

#[test]
fn test_from_directive_with_return_types() {
    let mut config = DiagramConfig::sequence("unused.jsonl");
    config.from = vec![Location::function("tmain()")];
    config.generate_return_types = true;

    let mut model = SequenceDiagram::create_database("api", &config);
    SequenceDiagram::create_builder("api", &config)
        .build(&constructor_and_method(), &mut model)
        .unwrap();

    let puml = render_sequence_with(&model, OutputFormat::PlantUml, &config).unwrap();
    assert!(puml.contains(": //int//"));
    assert!(puml.contains(": //A//"));
}

#[test]
fn test_decorated_trace() {
    let mut events = vec![AstEvent::FunctionEnter(CallableDecl::function("tmain"))];
    events.push(AstEvent::CallEnter {
        callee: CallableDecl::function("work"),
        location: None,
        comment: Some("// @cxxuml{note[left] does the work}".to_string()),
    });
    events.push(AstEvent::CallLeave);
    events.push(AstEvent::CallEnter {
        callee: CallableDecl::function("log").with_comment("/// \\cxxuml{skip}"),
        location: None,
        comment: None,
    });
    events.push(AstEvent::CallLeave);
    events.push(AstEvent::FunctionLeave);

    let model = build_sequence(&events, "api").unwrap();
    assert_eq!(model.message_count(), 1);

    let mermaid = render_sequence(&model, OutputFormat::Mermaid).unwrap();
    assert!(mermaid.contains(": does the work"));
    assert!(!mermaid.contains("log()"));
}

#[test]
fn test_list_values() {
    let model = build_sequence(&constructor_and_method(), "api").unwrap();
    assert_eq!(model.list_from_values(), vec!["tmain()"]);
    assert_eq!(model.list_to_values(), vec!["A::A()", "A::add(int,int)"]);
}
