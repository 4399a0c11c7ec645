//! Tests for the bytecode compiler.

use crate::{
    api::{self, CompilationOptions, Error},
    ast::{
        AssignOp, AstBuilder, BinaryOp, ComparisonOp, ContainerKind, Element, IntWidth, LogicalOp,
        Node, StrPart, UnaryOp,
    },
    compiler::{Compilation, CompileErrorKind},
    values::{SymbolTable, Value},
    vm::Opcode,
};
use bumpalo::Bump;
use pretty_assertions::assert_eq;

/// Compile with a private symbol table so symbol ids start at 0.
fn compile(program: &Node<'_>) -> Compilation {
    let symbols = SymbolTable::new();
    api::compile(program, &CompilationOptions::default().with_symbols(&symbols))
}

fn listing(program: &Node<'_>) -> Vec<String> {
    let compilation = compile(program);
    assert!(compilation.is_ok(), "unexpected errors: {:?}", compilation.errors);
    compilation.function.listing().unwrap()
}

fn errors(program: &Node<'_>) -> Vec<CompileErrorKind> {
    compile(program)
        .errors
        .into_iter()
        .map(|error| error.kind)
        .collect()
}

// === Literals and folding ===

#[test]
fn test_compile_integer() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let compilation = compile(b.program(&[b.int("42")]));

    assert_eq!(compilation.function.listing().unwrap(), vec!["LoadValue8 0", "Return"]);
    assert_eq!(compilation.function.constants, vec![Value::int(42)]);
    assert_eq!(compilation.function.frame_size, 0);
}

#[test]
fn test_singletons_have_their_own_opcodes() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    assert_eq!(listing(b.program(&[b.bool(true)])), vec!["True", "Return"]);
    assert_eq!(listing(b.program(&[b.bool(false)])), vec!["False", "Return"]);
    assert_eq!(listing(b.program(&[b.nil()])), vec!["Nil", "Return"]);
}

#[test]
fn test_empty_program_yields_nil() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    assert_eq!(listing(b.program(&[])), vec!["Nil", "Return"]);
}

#[test]
fn test_static_statements_are_skipped() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let compilation = compile(b.program(&[b.int("1"), b.str("unused"), b.nil()]));

    assert_eq!(compilation.function.listing().unwrap(), vec!["Nil", "Return"]);
    assert!(compilation.function.constants.is_empty());
}

#[test]
fn test_statement_values_are_popped() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.var("x", Some(b.int("1"))), b.ident("x")]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "Return"
        ]
    );
}

#[test]
fn test_arithmetic_is_folded() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let product = b.binary(BinaryOp::Mul, b.int("2"), b.int("3"));
    let compilation = compile(b.program(&[b.add(b.int("1"), product)]));

    assert_eq!(compilation.function.listing().unwrap(), vec!["LoadValue8 0", "Return"]);
    assert_eq!(compilation.function.constants, vec![Value::int(7)]);
}

#[test]
fn test_folding_can_be_disabled() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.add(b.int("1"), b.int("2"))]);
    let symbols = SymbolTable::new();
    let options = CompilationOptions::default()
        .with_symbols(&symbols)
        .without_folding();
    let function = api::compile(program, &options).into_result().unwrap();

    assert_eq!(
        function.listing().unwrap(),
        vec!["LoadValue8 0", "LoadValue8 1", "Add", "Return"]
    );
}

#[test]
fn test_runtime_errors_are_left_to_the_vm() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let quotient = b.binary(BinaryOp::Div, b.int("1"), b.int("0"));
    let function = compile(b.program(&[quotient])).function;

    assert_eq!(
        function.opcodes().unwrap(),
        vec![Opcode::LoadValue8, Opcode::LoadValue8, Opcode::Div, Opcode::Return]
    );
}

#[test]
fn test_fixed_width_overflow_wraps() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let max = b.int_with("127", 10, IntWidth::I8);
    let one = b.int_with("1", 10, IntWidth::I8);
    let function = compile(b.program(&[b.add(max, one)])).function;

    assert_eq!(
        function.constants,
        vec![Value::Int(crate::values::IntValue::I8(i8::MIN))]
    );
}

#[test]
fn test_default_int_grows_past_64_bits() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let huge: num_bigint::BigInt = "100000000000000000000".parse().unwrap();
    let function = compile(b.program(&[b.int("100000000000000000000")])).function;
    assert_eq!(function.constants, vec![Value::BigInt(huge)]);

    let sum = b.add(b.int("9223372036854775807"), b.int("1"));
    let function = compile(b.program(&[sum])).function;
    assert_eq!(
        function.constants,
        vec![Value::BigInt(num_bigint::BigInt::from(i64::MAX) + 1)]
    );

    let negated = b.unary(UnaryOp::Neg, b.int("-9223372036854775808"));
    let function = compile(b.program(&[negated])).function;
    assert_eq!(
        function.constants,
        vec![Value::BigInt(-num_bigint::BigInt::from(i64::MIN))]
    );
}

#[test]
fn test_malformed_numbers() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    assert_eq!(
        errors(b.program(&[b.int_with("300", 10, IntWidth::U8)])),
        vec![CompileErrorKind::MalformedNumber("300".into())]
    );
    assert_eq!(
        errors(b.program(&[b.int_with("12", 2, IntWidth::I64)])),
        vec![CompileErrorKind::MalformedNumber("12".into())]
    );
}

#[test]
fn test_wide_constant_index() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let mut statements = vec![b.var("x", Some(b.int("0")))];
    for i in 0..300 {
        statements.push(b.add(b.ident("x"), b.int(&i.to_string())));
    }
    let lines = listing(b.program(&statements));

    assert_eq!(
        &lines[lines.len() - 4..],
        &["GetLocal8 1", "LoadValue16 300", "Add", "Return"]
    );
}

// === Strings, regexes and ranges ===

#[test]
fn test_interpolation() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let greeting = b.interpolation(vec![
        b.lit_part("hi "),
        StrPart::Expr(b.ident("name")),
        b.lit_part(""),
    ]);
    let program = b.program(&[b.val("name", b.str("bob")), greeting]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "LoadValue8 1",
            "GetLocal8 1",
            "Interpolate 2",
            "Return"
        ]
    );
}

#[test]
fn test_static_interpolation_is_folded() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let text = b.interpolation(vec![b.lit_part("a"), StrPart::Expr(b.str("b"))]);
    let function = compile(b.program(&[text])).function;

    assert_eq!(function.constants, vec![Value::str("ab")]);
}

#[test]
fn test_dynamic_regex() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let regex = b.regex(
        vec![b.lit_part("^"), StrPart::Expr(b.ident("a")), b.lit_part("$")],
        "i",
    );
    let program = b.program(&[b.val("a", b.str("x+")), regex]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "LoadValue8 1",
            "GetLocal8 1",
            "LoadValue8 2",
            "NewRegex 1 3",
            "Return"
        ]
    );
}

#[test]
fn test_literal_regex_is_pooled() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.regex(vec![b.lit_part("a+")], "im")]);
    let function = compile(program).function;

    assert_eq!(function.listing().unwrap(), vec!["LoadValue8 0", "Return"]);
    assert_eq!(
        function.constants,
        vec![Value::Regex {
            source: "a+".into(),
            flags: 3
        }]
    );
}

#[test]
fn test_malformed_regex() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let unbalanced = errors(b.program(&[b.regex(vec![b.lit_part("(")], "")]));
    assert!(matches!(
        unbalanced.as_slice(),
        [CompileErrorKind::MalformedRegex(_)]
    ));

    assert_eq!(
        errors(b.program(&[b.regex(vec![b.lit_part("a")], "q")])),
        vec![CompileErrorKind::MalformedRegex("unknown flag 'q'".into())]
    );
}

#[test]
fn test_ranges() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let function = compile(b.program(&[b.range(b.int("1"), b.int("10"), true)])).function;
    assert_eq!(function.listing().unwrap(), vec!["LoadValue8 0", "Return"]);
    assert_eq!(
        function.constants,
        vec![Value::Range {
            from: Box::new(Value::int(1)),
            to: Box::new(Value::int(10)),
            exclusive: true
        }]
    );

    let program = b.program(&[
        b.val("n", b.int("5")),
        b.range(b.ident("n"), b.int("10"), false),
    ]);
    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "LoadValue8 1",
            "NewRange 0",
            "Return"
        ]
    );
}

// === Collections ===

#[test]
fn test_static_list_is_copied_on_load() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let function = compile(b.program(&[b.list(&[b.int("1"), b.int("2")])])).function;

    assert_eq!(function.listing().unwrap(), vec!["LoadValue8 0", "Copy", "Return"]);
    assert_eq!(
        function.constants,
        vec![Value::List(vec![Value::int(1), Value::int(2)])]
    );
}

#[test]
fn test_nested_static_collections_are_one_constant() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let inner = b.list(&[b.int("1")]);
    let program = b.program(&[b.list(&[inner, b.tuple(&[b.int("2")])])]);
    let compilation = compile(program);

    assert_eq!(
        compilation.function.listing().unwrap(),
        vec!["LoadValue8 0", "Copy", "Return"]
    );
    assert_eq!(
        compilation.function.constants,
        vec![Value::List(vec![
            Value::List(vec![Value::int(1)]),
            Value::Tuple(vec![Value::int(2)])
        ])]
    );
}

#[test]
fn test_static_set_drops_repeats() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.set(&[b.int("1"), b.int("1"), b.int("2")])]);
    let compilation = compile(program);

    assert_eq!(
        compilation.function.listing().unwrap(),
        vec!["LoadValue8 0", "Copy", "Return"]
    );
    assert_eq!(
        compilation.function.constants,
        vec![Value::Set(vec![Value::int(1), Value::int(2)])]
    );
}

#[test]
fn test_static_tuple_is_shared() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.tuple(&[b.int("1"), b.str("a")])]);
    assert_eq!(listing(program), vec!["LoadValue8 0", "Return"]);
}

#[test]
fn test_static_runs_are_extended() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let list = b.list(&[b.int("1"), b.int("2"), b.ident("x"), b.int("3"), b.int("4")]);
    let program = b.program(&[b.val("x", b.int("0")), list]);
    let compilation = compile(program);

    assert_eq!(
        compilation.function.listing().unwrap(),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "NewList8 5",
            "LoadValue8 1",
            "Extend",
            "GetLocal8 1",
            "Append",
            "LoadValue8 2",
            "Extend",
            "Return"
        ]
    );
    assert_eq!(
        compilation.function.constants[2],
        Value::List(vec![Value::int(3), Value::int(4)])
    );
}

#[test]
fn test_record_fields() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let record = b.record(&[("a", b.int("1")), ("b", b.ident("x"))]);
    let program = b.program(&[b.val("x", b.int("0")), record]);
    let compilation = compile(program);

    assert_eq!(
        compilation.function.listing().unwrap(),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "NewRecord8 2",
            "LoadValue8 1",
            "LoadValue8 2",
            "AppendAt",
            "LoadValue8 3",
            "GetLocal8 1",
            "AppendAt",
            "Return"
        ]
    );
    assert_eq!(compilation.function.constants[1], Value::symbol("a"));
}

#[test]
fn test_static_record_is_pooled() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let function = compile(b.program(&[b.record(&[("a", b.int("1"))])])).function;

    assert_eq!(function.listing().unwrap(), vec!["LoadValue8 0", "Return"]);
    assert_eq!(
        function.constants,
        vec![Value::Record(vec![("a".into(), Value::int(1))])]
    );
}

#[test]
fn test_conditional_element() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let list = b.collection(
        ContainerKind::List,
        vec![
            Element::Item(b.int("1")),
            b.elem_if(b.ident("flag"), false, Element::Item(b.int("2"))),
        ],
        None,
    );
    let program = b.program(&[b.var("flag", Some(b.bool(true))), list]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "True",
            "SetLocal8 1",
            "Pop",
            "NewList8 1",
            "LoadValue8 0",
            "Append",
            "GetLocal8 1",
            "JumpUnless 7",
            "Pop",
            "LoadValue8 1",
            "Append",
            "Jump 1",
            "Pop",
            "Return"
        ]
    );
}

#[test]
fn test_statically_false_element_is_dropped() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let list = b.collection(
        ContainerKind::List,
        vec![
            Element::Item(b.ident("x")),
            b.elem_if(b.bool(false), false, Element::Item(b.int("2"))),
        ],
        None,
    );
    let program = b.program(&[b.val("x", b.int("0")), list]);
    let function = compile(program).function;

    assert_eq!(function.constants, vec![Value::int(0)]);
}

#[test]
fn test_loop_element_has_its_own_scope() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let list = b.collection(
        ContainerKind::List,
        vec![b.elem_for("i", b.ident("xs"), Element::Item(b.ident("i")))],
        None,
    );
    let program = b.program(&[b.val("xs", b.list(&[b.int("1")])), list]);
    let compilation = compile(program);

    assert!(compilation.is_ok(), "{:?}", compilation.errors);
    // xs, the iterator and i
    assert_eq!(compilation.function.frame_size, 4);
    let lines = compilation.function.listing().unwrap();
    assert_eq!(&lines[lines.len() - 2..], &["LeaveScope8 3 2", "Return"]);
}

#[test]
fn test_capacity() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let list = b.collection(
        ContainerKind::List,
        vec![Element::Item(b.int("1"))],
        Some(b.int("10")),
    );
    assert_eq!(
        listing(b.program(&[list])),
        vec!["NewList8 10", "LoadValue8 0", "Append", "Return"]
    );
}

#[test]
fn test_capacity_errors() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let generated = b.collection(
        ContainerKind::List,
        vec![b.elem_if(b.bool(true), false, Element::Item(b.int("1")))],
        Some(b.int("4")),
    );
    assert_eq!(
        errors(b.program(&[generated])),
        vec![CompileErrorKind::CapacityWithConditional]
    );

    let negative = b.collection(
        ContainerKind::List,
        vec![],
        Some(b.unary(UnaryOp::Neg, b.int("1"))),
    );
    assert_eq!(
        errors(b.program(&[negative])),
        vec![CompileErrorKind::InvalidCapacity]
    );
}

#[test]
fn test_map_items_need_keys() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let map = b.collection(
        ContainerKind::Map,
        vec![Element::Item(b.int("1"))],
        None,
    );
    assert_eq!(
        errors(b.program(&[map])),
        vec![CompileErrorKind::InvalidRecordKey]
    );
}

// === Locals and assignment ===

#[test]
fn test_uninitialized_read() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.var("x", None), b.ident("x")]);
    assert_eq!(
        errors(program),
        vec![CompileErrorKind::UninitializedAccess("x".into())]
    );
}

#[test]
fn test_deferred_initialization() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.declare("x", false, None),
        b.assign(AssignOp::Set, b.ident("x"), b.int("1")),
        b.ident("x"),
    ]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "Nil",
            "Pop",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "Return"
        ]
    );
}

#[test]
fn test_val_is_assigned_once() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.val("x", b.int("1")),
        b.assign(AssignOp::Set, b.ident("x"), b.int("2")),
    ]);
    assert_eq!(errors(program), vec![CompileErrorKind::ReassignedVal("x".into())]);

    let deferred = b.program(&[
        b.declare("y", false, None),
        b.assign(AssignOp::Set, b.ident("y"), b.int("1")),
        b.assign(AssignOp::Set, b.ident("y"), b.int("2")),
    ]);
    assert_eq!(errors(deferred), vec![CompileErrorKind::ReassignedVal("y".into())]);

    let compound = b.program(&[
        b.val("z", b.int("1")),
        b.assign(AssignOp::Compound(BinaryOp::Add), b.ident("z"), b.int("2")),
    ]);
    assert_eq!(errors(compound), vec![CompileErrorKind::ReassignedVal("z".into())]);
}

#[test]
fn test_assignment_to_undeclared_name() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.assign(AssignOp::Set, b.ident("x"), b.int("1"))]);
    assert_eq!(
        errors(program),
        vec![CompileErrorKind::UndeclaredVariable("x".into())]
    );
}

#[test]
fn test_walrus_declares_a_var() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.assign(AssignOp::Declare, b.ident("x"), b.int("1")),
        b.assign(AssignOp::Set, b.ident("x"), b.int("2")),
    ]);
    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "LoadValue8 1",
            "SetLocal8 1",
            "Return"
        ]
    );

    let on_subscript = b.program(&[b.assign(
        AssignOp::Declare,
        b.subscript(b.self_ref(), b.int("0")),
        b.int("1"),
    )]);
    assert!(matches!(
        errors(on_subscript).as_slice(),
        [CompileErrorKind::IllegalOperator { .. }]
    ));
}

#[test]
fn test_compound_assignment() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.var("x", Some(b.int("1"))),
        b.assign(AssignOp::Compound(BinaryOp::Add), b.ident("x"), b.int("2")),
    ]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "LoadValue8 1",
            "Add",
            "SetLocal8 1",
            "Return"
        ]
    );
}

#[test]
fn test_or_assignment_keeps_truthy_value() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.var("x", Some(b.nil())),
        b.assign(AssignOp::Or, b.ident("x"), b.int("5")),
    ]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "Nil",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "JumpIf 5",
            "Pop",
            "LoadValue8 0",
            "SetLocal8 1",
            "Return"
        ]
    );
}

#[test]
fn test_subscript_assignment() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.val("a", b.list(&[b.int("1"), b.int("2")])),
        b.assign(AssignOp::Set, b.subscript(b.ident("a"), b.int("0")), b.int("3")),
    ]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "Copy",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "LoadValue8 1",
            "LoadValue8 2",
            "SubscriptSet",
            "Return"
        ]
    );
}

#[test]
fn test_compound_subscript_assignment() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.assign(
        AssignOp::Compound(BinaryOp::Mul),
        b.subscript(b.self_ref(), b.int("0")),
        b.int("2"),
    )]);

    assert_eq!(
        listing(program),
        vec![
            "GetLocal8 0",
            "LoadValue8 0",
            "Dup2",
            "Subscript",
            "LoadValue8 1",
            "Mul",
            "SubscriptSet",
            "Return"
        ]
    );
}

#[test]
fn test_attribute_assignment_calls_setter() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let symbols = SymbolTable::new();
    let program = b.program(&[b.assign(
        AssignOp::Set,
        b.attribute(b.self_ref(), "name"),
        b.int("1"),
    )]);
    let function = api::compile(program, &CompilationOptions::default().with_symbols(&symbols))
        .into_result()
        .unwrap();

    assert_eq!(
        function.listing().unwrap(),
        vec!["GetLocal8 0", "LoadValue8 0", "CallMethod 0 1", "Return"]
    );
    assert_eq!(symbols.lookup("name=").map(|s| s.id()), Some(0));
}

#[test]
fn test_rejected_assignment_still_compiles_its_value() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.val("x", b.int("1")),
        b.assign(AssignOp::Set, b.ident("x"), b.ident("y")),
        b.assign(AssignOp::Set, b.ident("z"), b.ident("w")),
    ]);
    assert_eq!(
        errors(program),
        vec![
            CompileErrorKind::ReassignedVal("x".into()),
            CompileErrorKind::UndeclaredVariable("y".into()),
            CompileErrorKind::UndeclaredVariable("z".into()),
            CompileErrorKind::UndeclaredVariable("w".into()),
        ]
    );
}

#[test]
fn test_invalid_assignment_target() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.assign(AssignOp::Set, b.int("1"), b.int("2"))]);
    assert_eq!(
        errors(program),
        vec![CompileErrorKind::InvalidAssignmentTarget("integer")]
    );
}

#[test]
fn test_block_scopes_reuse_slots() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.do_block(&[b.val("y", b.int("1")), b.ident("y")]),
        b.do_block(&[b.val("z", b.int("2")), b.ident("z")]),
    ]);
    let compilation = compile(program);

    assert_eq!(
        compilation.function.listing().unwrap(),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "LeaveScope8 1 1",
            "Pop",
            "LoadValue8 1",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "LeaveScope8 1 1",
            "Return"
        ]
    );
    assert_eq!(compilation.function.frame_size, 2);
}

#[test]
fn test_duplicate_local() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.val("x", b.int("1")), b.val("x", b.int("2"))]);
    assert_eq!(errors(program), vec![CompileErrorKind::DuplicateLocal("x".into())]);
}

// === Module constants ===

#[test]
fn test_constants_fold_after_definition() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.assign(AssignOp::Set, b.const_ref(&["LIMIT"]), b.int("10")),
        b.add(b.const_ref(&["LIMIT"]), b.int("1")),
    ]);
    let compilation = compile(program);

    assert_eq!(
        compilation.function.listing().unwrap(),
        vec!["LoadValue8 0", "SetConst8 0", "Pop", "LoadValue8 1", "Return"]
    );
    assert_eq!(compilation.function.constants[1], Value::int(11));
}

#[test]
fn test_conditional_constant_is_not_folded() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let define = b.assign(AssignOp::Set, b.const_ref(&["LIMIT"]), b.int("10"));
    let program = b.program(&[
        b.var("flag", Some(b.bool(true))),
        b.if_(b.ident("flag"), &[define], None),
        b.const_ref(&["LIMIT"]),
    ]);
    let lines = listing(program);

    assert_eq!(&lines[lines.len() - 2..], &["GetConst8 0", "Return"]);
}

#[test]
fn test_constant_is_assigned_once() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.assign(AssignOp::Set, b.const_ref(&["A"]), b.int("1")),
        b.assign(AssignOp::Set, b.const_ref(&["A"]), b.int("2")),
        b.assign(AssignOp::Compound(BinaryOp::Add), b.const_ref(&["B"]), b.int("1")),
    ]);
    assert_eq!(
        errors(program),
        vec![
            CompileErrorKind::ReassignedConstant("A".into()),
            CompileErrorKind::ReassignedConstant("B".into())
        ]
    );
}

// === Control flow ===

#[test]
fn test_if_else() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.var("c", Some(b.bool(true))),
        b.if_(b.ident("c"), &[b.int("1")], Some(&[b.int("2")][..])),
    ]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "True",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "JumpUnless 6",
            "Pop",
            "LoadValue8 0",
            "Jump 3",
            "Pop",
            "LoadValue8 1",
            "Return"
        ]
    );
}

#[test]
fn test_static_condition_emits_live_branch_only() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let function = compile(b.program(&[b.if_(
        b.bool(true),
        &[b.int("1")],
        Some(&[b.int("2")][..]),
    )]))
    .function;
    assert_eq!(function.listing().unwrap(), vec!["LoadValue8 0", "Return"]);
    assert_eq!(function.constants, vec![Value::int(1)]);

    let unless = b.program(&[b.unless(b.bool(true), &[b.int("1")], None)]);
    assert_eq!(listing(unless), vec!["Nil", "Return"]);
}

#[test]
fn test_coalesce() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.var("a", Some(b.nil())),
        b.logical(LogicalOp::Coalesce, b.ident("a"), b.int("1")),
    ]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "Nil",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "JumpIfNotNil 3",
            "Pop",
            "LoadValue8 0",
            "Return"
        ]
    );
}

#[test]
fn test_static_short_circuit_skips_right_operand() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    // The right operand is never compiled, so the undeclared name is fine.
    let program = b.program(&[b.logical(LogicalOp::And, b.bool(false), b.ident("nope"))]);
    assert_eq!(listing(program), vec!["False", "Return"]);

    let program = b.program(&[
        b.var("y", Some(b.int("1"))),
        b.logical(LogicalOp::And, b.bool(true), b.ident("y")),
    ]);
    let lines = listing(program);
    assert_eq!(&lines[lines.len() - 2..], &["GetLocal8 1", "Return"]);
}

#[test]
fn test_while_loop() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let cond = b.compare(ComparisonOp::Lt, b.ident("i"), b.int("3"));
    let step = b.assign(AssignOp::Compound(BinaryOp::Add), b.ident("i"), b.int("1"));
    let program = b.program(&[b.var("i", Some(b.int("0"))), b.while_(cond, &[step], false)]);
    let function = compile(program).function;

    assert_eq!(
        function.listing().unwrap(),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "LoadValue8 1",
            "Less",
            "JumpUnless 12",
            "Pop",
            "GetLocal8 1",
            "LoadValue8 2",
            "Add",
            "SetLocal8 1",
            "Pop",
            "Loop 20",
            "Pop",
            "Nil",
            "Return"
        ]
    );
    let instrs = function.decode().unwrap();
    assert_eq!(instrs[14].jump_target(), Some(instrs[4].offset));
}

#[test]
fn test_statically_false_while_is_nil() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.while_(b.bool(false), &[b.ident("nope")], false)]);
    assert_eq!(listing(program), vec!["Nil", "Return"]);
}

#[test]
fn test_loop_break_value() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.loop_(&[b.break_(Some(b.int("1")))])]);
    assert_eq!(
        listing(program),
        vec!["LoadValue8 0", "Jump 4", "Pop", "Loop 9", "Return"]
    );
}

#[test]
fn test_break_releases_loop_locals() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.loop_(&[
        b.val("y", b.int("1")),
        b.break_(Some(b.ident("y"))),
    ])]);

    assert_eq!(
        listing(program),
        vec![
            "PrepLocals8 2",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "LeaveScope8 1 1",
            "Jump 4",
            "Pop",
            "Loop 17",
            "Return"
        ]
    );
}

#[test]
fn test_for_in_with_next() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.val("items", b.list(&[b.int("1"), b.int("2")])),
        b.for_in("x", b.ident("items"), &[b.next()]),
    ]);
    let compilation = compile(program);

    assert_eq!(
        compilation.function.listing().unwrap(),
        vec![
            "PrepLocals8 4",
            "LoadValue8 0",
            "Copy",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "GetIterator",
            "SetLocal8 2",
            "Pop",
            "GetLocal8 2",
            "ForIn 10",
            "SetLocal8 3",
            "Pop",
            "Jump 1",
            "Pop",
            "Loop 15",
            "Nil",
            "LeaveScope8 3 2",
            "Return"
        ]
    );
    assert_eq!(compilation.function.frame_size, 4);
}

#[test]
fn test_c_style_for() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let init = b.var("i", Some(b.int("0")));
    let cond = b.compare(ComparisonOp::Lt, b.ident("i"), b.int("10"));
    let step = b.assign(AssignOp::Compound(BinaryOp::Add), b.ident("i"), b.int("1"));
    let program = b.program(&[b.for_(Some(init), Some(cond), Some(step), &[b.ident("i")])]);
    let compilation = compile(program);

    assert!(compilation.is_ok(), "{:?}", compilation.errors);
    let lines = compilation.function.listing().unwrap();
    // The loop variable lives in the loop scope and is released on exit.
    assert_eq!(&lines[lines.len() - 4..], &["Pop", "Nil", "LeaveScope8 1 1", "Return"]);
}

#[test]
fn test_break_and_next_outside_loop() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    assert_eq!(
        errors(b.program(&[b.break_(None)])),
        vec![CompileErrorKind::BreakOutsideLoop("break")]
    );
    assert_eq!(
        errors(b.program(&[b.next()])),
        vec![CompileErrorKind::BreakOutsideLoop("next")]
    );
    assert_eq!(
        errors(b.program(&[b.return_(None)])),
        vec![CompileErrorKind::ReturnOutsideFunction]
    );
}

// === Calls and definitions ===

#[test]
fn test_unresolved_call_is_a_self_method() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.call(b.ident("puts"), vec![b.arg(b.int("1"))])]);
    assert_eq!(
        listing(program),
        vec!["GetLocal8 0", "LoadValue8 0", "CallMethod 0 1", "Return"]
    );
}

#[test]
fn test_keyword_arguments() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let call = b.call(
        b.ident("f"),
        vec![b.named_arg("k", b.int("2")), b.arg(b.int("1"))],
    );
    let program = b.program(&[b.var("f", Some(b.nil())), call]);
    let compilation = compile(program);

    assert_eq!(
        compilation.function.listing().unwrap(),
        vec![
            "PrepLocals8 2",
            "Nil",
            "SetLocal8 1",
            "Pop",
            "GetLocal8 1",
            "LoadValue8 0",
            "LoadValue8 1",
            "LoadValue8 2",
            "CallKw 2",
            "Return"
        ]
    );
    // Positional arguments come first.
    assert_eq!(compilation.function.constants[0], Value::int(1));
    assert_eq!(
        compilation.function.constants[2],
        Value::Tuple(vec![Value::symbol("k")])
    );
}

#[test]
fn test_method_call_with_keywords() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let call = b.method_call(
        b.self_ref(),
        "log",
        vec![b.named_arg("level", b.sym("warn"))],
    );
    assert_eq!(
        listing(b.program(&[call])),
        vec!["GetLocal8 0", "LoadValue8 0", "LoadValue8 1", "CallMethodKw 0 1", "Return"]
    );
}

#[test]
fn test_argument_errors() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let duplicate = b.method_call(
        b.self_ref(),
        "f",
        vec![b.named_arg("k", b.int("1")), b.named_arg("k", b.int("2"))],
    );
    assert_eq!(
        errors(b.program(&[duplicate])),
        vec![CompileErrorKind::DuplicateNamedArgument("k".into())]
    );

    let args = (0..256).map(|_| b.arg(b.int("1"))).collect();
    let too_many = b.method_call(b.self_ref(), "f", args);
    assert_eq!(
        errors(b.program(&[too_many])),
        vec![CompileErrorKind::TooManyArguments]
    );
}

#[test]
fn test_named_function() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let def = b.function(
        Some("add"),
        &["a", "b"],
        &[b.add(b.ident("a"), b.ident("b"))],
    );
    let function = compile(b.program(&[def])).into_result().unwrap();

    assert_eq!(
        function.listing().unwrap(),
        vec!["PrepLocals8 2", "LoadValue8 0", "SetLocal8 1", "Return"]
    );
    let add = function.functions().next().unwrap();
    assert_eq!(add.name.as_str(), "add");
    assert_eq!(add.arity, 2);
    assert_eq!(add.frame_size, 3);
    assert_eq!(
        add.listing().unwrap(),
        vec!["PrepLocals8 3", "GetLocal8 1", "GetLocal8 2", "Add", "Return"]
    );
}

#[test]
fn test_function_sees_module_constants() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.assign(AssignOp::Set, b.const_ref(&["LIMIT"]), b.int("2")),
        b.function(None, &[], &[b.add(b.const_ref(&["LIMIT"]), b.int("1"))]),
    ]);
    let function = compile(program).into_result().unwrap();
    let inner = function.functions().next().unwrap();

    assert_eq!(inner.listing().unwrap(), vec!["LoadValue8 0", "Return"]);
    assert_eq!(inner.constants, vec![Value::int(3)]);
}

#[test]
fn test_function_errors_are_reported() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.function(None, &["a"], &[b.ident("nope")])]);
    assert_eq!(
        errors(program),
        vec![CompileErrorKind::UndeclaredVariable("nope".into())]
    );
}

#[test]
fn test_duplicate_parameter_does_not_hide_body_errors() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.function(None, &["a", "a"], &[b.ident("nope")])]);
    let compilation = compile(program);

    let kinds: Vec<_> = compilation.errors.iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            CompileErrorKind::DuplicateLocal("a".into()),
            CompileErrorKind::UndeclaredVariable("nope".into())
        ]
    );
    let inner = compilation.function.functions().next().unwrap();
    assert_eq!(inner.arity, 2);
    assert_eq!(inner.frame_size, 3);
}

#[test]
fn test_return_in_function() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.function(Some("f"), &[], &[b.return_(Some(b.int("1")))])]);
    let function = compile(program).into_result().unwrap();
    let f = function.functions().next().unwrap();

    assert_eq!(f.listing().unwrap(), vec!["LoadValue8 0", "Return", "Return"]);
}

#[test]
fn test_class_definition() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let method = b.function_def(Some("x"), &[], &[b.int("1")]);
    let compilation = compile(b.program(&[b.class("Point", vec![method])]));

    assert_eq!(
        compilation.function.listing().unwrap(),
        vec![
            "NewClass 0",
            "LoadValue8 0",
            "DefineMethod 1",
            "SetConst8 0",
            "Return"
        ]
    );
    let x = compilation.function.functions().next().unwrap();
    assert_eq!(x.name.as_str(), "x");
}

#[test]
fn test_class_errors() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.class("Point", vec![]), b.class("Point", vec![])]);
    assert_eq!(
        errors(program),
        vec![CompileErrorKind::ReassignedConstant("Point".into())]
    );

    let anonymous = b.function_def(None, &[], &[]);
    assert_eq!(
        errors(b.program(&[b.class("Shape", vec![anonymous])])),
        vec![CompileErrorKind::Unimplemented("anonymous method".into())]
    );
}

// === Errors and line info ===

#[test]
fn test_errors_do_not_stop_compilation() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.at(1).ident("a"),
        b.at(2).val("b", b.at(2).int("1")),
        b.at(3).ident("c"),
    ]);
    let compilation = compile(program);

    let lines: Vec<u32> = compilation.errors.iter().map(|e| e.location.line).collect();
    assert_eq!(lines, vec![1, 3]);
    // Unresolved names read as nil so every statement keeps its shape.
    assert_eq!(
        compilation.function.listing().unwrap(),
        vec![
            "PrepLocals8 2",
            "Nil",
            "Pop",
            "LoadValue8 0",
            "SetLocal8 1",
            "Pop",
            "Nil",
            "Return"
        ]
    );
}

#[test]
fn test_every_undeclared_name_is_reported() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let both = vec![
        CompileErrorKind::UndeclaredVariable("x".into()),
        CompileErrorKind::UndeclaredVariable("y".into()),
    ];

    assert_eq!(errors(b.program(&[b.list(&[b.ident("x"), b.ident("y")])])), both);
    assert_eq!(errors(b.program(&[b.add(b.ident("x"), b.ident("y"))])), both);

    let call = b.method_call(
        b.self_ref(),
        "f",
        vec![b.named_arg("k", b.ident("x")), b.named_arg("k", b.ident("y"))],
    );
    assert_eq!(
        errors(b.program(&[call])),
        vec![
            CompileErrorKind::UndeclaredVariable("x".into()),
            CompileErrorKind::DuplicateNamedArgument("k".into()),
            CompileErrorKind::UndeclaredVariable("y".into()),
        ]
    );
}

#[test]
fn test_malformed_literals_in_one_expression() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[b.add(
        b.int_with("300", 10, IntWidth::U8),
        b.regex(vec![b.lit_part("(")], ""),
    )]);
    let kinds = errors(program);

    assert!(matches!(
        kinds.as_slice(),
        [CompileErrorKind::MalformedNumber(_), CompileErrorKind::MalformedRegex(_)]
    ));
}

#[test]
fn test_failed_statement_discards_its_loops() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let args = (0..256).map(|_| b.arg(b.int("1"))).collect();
    let cond = b.method_call(b.self_ref(), "ready", args);
    let program = b.program(&[
        b.while_(cond, &[b.nil()], false),
        b.break_(None),
        b.val("x", b.int("1")),
    ]);
    let compilation = compile(program);

    let kinds: Vec<_> = compilation.errors.iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            CompileErrorKind::TooManyArguments,
            CompileErrorKind::BreakOutsideLoop("break")
        ]
    );
    // The aborted loop scope is gone: x gets the first slot.
    assert_eq!(compilation.function.frame_size, 2);
}

#[test]
fn test_unsupported_construct() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    assert_eq!(
        errors(b.program(&[b.unsupported("closure capture")])),
        vec![CompileErrorKind::Unimplemented("closure capture".into())]
    );
}

#[test]
fn test_line_runs() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.at(1).val("x", b.at(1).int("1")),
        b.at(3).ident("x"),
    ]);
    let function = compile(program).function;

    assert_eq!(function.lines, vec![(1, 4), (3, 1), (1, 1)]);
    assert_eq!(function.line_of(4), Some(3));
}

#[test]
fn test_diagnostics() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let err = compile(b.program(&[b.at(7).ident("x")]))
        .into_result()
        .unwrap_err();

    let Error::Compilation { diagnostics } = err else {
        panic!("expected a compilation error");
    };
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].line, 7);
    assert_eq!(diagnostics[0].message, "undeclared variable 'x'");
    assert_eq!(diagnostics[0].code.as_deref(), Some("C010"));
    assert!(diagnostics[0].help.is_some());
}

#[test]
fn test_function_round_trips_through_postcard() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.val("xs", b.list(&[b.int("1"), b.str("two")])),
        b.function(Some("f"), &["a"], &[b.ident("a")]),
    ]);
    let function = compile(program).into_result().unwrap();

    let bytes = function.to_bytes().unwrap();
    let decoded = crate::vm::Function::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, function);
}
