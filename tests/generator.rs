//! Behavior of compiled generator plans driven through the stepper.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use jsgen::{Engine, EngineError, FunctionKind, GeneratorInstance, JsValue};

#[allow(clippy::expect_used)]
fn instantiate(engine: &mut Engine, body: Vec<jsgen::ast::Statement>) -> GeneratorInstance {
    let function = engine.define_generator("gen", Vec::new(), body, FunctionKind::Generator);
    engine
        .instantiate(&function, &[])
        .expect("generator instantiation failed")
}

#[test]
fn test_counting_loop_yields_each_index() {
    for limit in [0.0, 1.0, 2.0, 5.0] {
        let mut engine = Engine::new();
        let body = vec![count_loop("i", num(limit), vec![yield_stmt(ident("i"))])];
        let instance = instantiate(&mut engine, body);
        let (yields, done) = collect_yields(&mut engine, &instance);
        let expected: Vec<f64> = (0..limit as usize).map(|i| i as f64).collect();
        assert_eq!(numbers(&yields), expected);
        assert_eq!(done, JsValue::Undefined);
    }
}

#[test]
fn test_do_while_runs_body_before_condition() {
    let mut engine = Engine::new();
    // let i = 0; do { yield i; i = i + 1; } while (i < 2);
    let body = vec![
        let_("i", num(0.0)),
        do_while(
            vec![yield_stmt(ident("i")), assign("i", add(ident("i"), num(1.0)))],
            lt(ident("i"), num(2.0)),
        ),
    ];
    let instance = instantiate(&mut engine, body);
    let (yields, done) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![0.0, 1.0]);
    assert_eq!(done, JsValue::Undefined);

    // A condition that is false from the start still runs the body once.
    let mut engine = Engine::new();
    let body = vec![
        let_("i", num(5.0)),
        do_while(vec![yield_stmt(ident("i"))], lt(ident("i"), num(2.0))),
    ];
    let instance = instantiate(&mut engine, body);
    let (yields, done) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![5.0]);
    assert_eq!(done, JsValue::Undefined);
}

#[test]
#[allow(clippy::expect_used)]
fn test_do_while_yield_in_condition() {
    let mut engine = Engine::new();
    // do { yield 1; } while (yield 2);
    let body = vec![do_while(
        vec![yield_stmt(num(1.0))],
        yield_(Some(num(2.0))),
    )];
    let instance = instantiate(&mut engine, body);
    let first = instance.next(&mut engine, JsValue::Undefined).expect("body");
    assert_eq!(expect_yield(first), JsValue::Number(1.0));
    let second = instance
        .next(&mut engine, JsValue::Undefined)
        .expect("condition");
    assert_eq!(expect_yield(second), JsValue::Number(2.0));
    // Truthy resume loops back into the body, falsy resume exits.
    let third = instance
        .next(&mut engine, JsValue::Boolean(true))
        .expect("second pass");
    assert_eq!(expect_yield(third), JsValue::Number(1.0));
    let fourth = instance
        .next(&mut engine, JsValue::Undefined)
        .expect("condition again");
    assert_eq!(expect_yield(fourth), JsValue::Number(2.0));
    let done = instance
        .next(&mut engine, JsValue::Boolean(false))
        .expect("exit");
    assert_eq!(expect_done(done), JsValue::Undefined);
    assert!(instance.is_completed());
}

#[test]
#[allow(clippy::expect_used)]
fn test_done_generator_stays_done() {
    let mut engine = Engine::new();
    let instance = instantiate(&mut engine, vec![yield_stmt(num(1.0))]);
    collect_yields(&mut engine, &instance);
    assert!(instance.is_completed());
    for _ in 0..3 {
        let event = instance
            .next(&mut engine, JsValue::Number(7.0))
            .expect("next on a completed generator");
        assert_eq!(expect_done(event), JsValue::Undefined);
    }
}

#[test]
#[allow(clippy::expect_used)]
fn test_throw_and_return_on_completed_report_done() {
    let mut engine = Engine::new();
    let instance = instantiate(&mut engine, vec![yield_stmt(num(1.0))]);
    collect_yields(&mut engine, &instance);
    assert!(instance.is_completed());
    let thrown = instance
        .throw(&mut engine, JsValue::string("late"))
        .expect("throw on a completed generator");
    assert_eq!(expect_done(thrown), JsValue::Undefined);
    let returned = instance
        .return_value(&mut engine, JsValue::Number(9.0))
        .expect("return on a completed generator");
    assert_eq!(expect_done(returned), JsValue::Undefined);
    assert!(instance.is_completed());
}

#[test]
#[allow(clippy::expect_used)]
fn test_resume_value_lands_in_expression() {
    let mut engine = Engine::new();
    // let x = yield 1; yield x + 1;
    let body = vec![
        let_("x", yield_(Some(num(1.0)))),
        yield_stmt(add(ident("x"), num(1.0))),
    ];
    let instance = instantiate(&mut engine, body);
    let first = instance.next(&mut engine, JsValue::Undefined).expect("first");
    assert_eq!(expect_yield(first), JsValue::Number(1.0));
    let second = instance.next(&mut engine, JsValue::Number(10.0)).expect("second");
    assert_eq!(expect_yield(second), JsValue::Number(11.0));
}

#[test]
#[allow(clippy::expect_used)]
fn test_two_yields_in_one_expression_are_split() {
    let mut engine = Engine::new();
    // let s = (yield 1) + (yield 2); yield s;
    let body = vec![
        let_("s", add(yield_(Some(num(1.0))), yield_(Some(num(2.0))))),
        yield_stmt(ident("s")),
    ];
    let instance = instantiate(&mut engine, body);
    assert_eq!(
        expect_yield(instance.next(&mut engine, JsValue::Undefined).expect("step")),
        JsValue::Number(1.0)
    );
    assert_eq!(
        expect_yield(instance.next(&mut engine, JsValue::Number(10.0)).expect("step")),
        JsValue::Number(2.0)
    );
    assert_eq!(
        expect_yield(instance.next(&mut engine, JsValue::Number(20.0)).expect("step")),
        JsValue::Number(30.0)
    );
}

#[test]
fn test_return_statement_completes_with_value() {
    let mut engine = Engine::new();
    let body = vec![
        yield_stmt(num(1.0)),
        ret(Some(num(5.0))),
        yield_stmt(num(9.0)),
    ];
    let instance = instantiate(&mut engine, body);
    let (yields, done) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![1.0]);
    assert_eq!(done, JsValue::Number(5.0));
}

#[test]
#[allow(clippy::expect_used)]
fn test_early_return_runs_finally() {
    let mut engine = Engine::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    engine.define_native("record", move |_interp, args| {
        sink.borrow_mut()
            .push(args.first().cloned().unwrap_or(JsValue::Undefined));
        Ok(JsValue::Undefined)
    });
    // try { yield 1; yield 2; } finally { record(3); }
    let body = vec![try_finally(
        vec![yield_stmt(num(1.0)), yield_stmt(num(2.0))],
        vec![expr_stmt(call("record", vec![num(3.0)]))],
    )];
    let instance = instantiate(&mut engine, body);
    let first = instance.next(&mut engine, JsValue::Undefined).expect("first");
    assert_eq!(expect_yield(first), JsValue::Number(1.0));

    let done = instance
        .return_value(&mut engine, JsValue::Number(99.0))
        .expect("return");
    assert_eq!(expect_done(done), JsValue::Number(99.0));
    assert_eq!(&*log.borrow(), &[JsValue::Number(3.0)]);
}

#[test]
#[allow(clippy::expect_used)]
fn test_yield_inside_finally_suspends() {
    let mut engine = Engine::new();
    // try { yield 1; } finally { yield 2; }
    let body = vec![try_finally(
        vec![yield_stmt(num(1.0))],
        vec![yield_stmt(num(2.0))],
    )];
    let instance = instantiate(&mut engine, body);
    let (yields, done) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![1.0, 2.0]);
    assert_eq!(done, JsValue::Undefined);
}

#[test]
#[allow(clippy::expect_used)]
fn test_injected_throw_is_caught() {
    let mut engine = Engine::new();
    // try { yield 1; } catch (e) { yield e; }
    let body = vec![try_catch(
        vec![yield_stmt(num(1.0))],
        "e",
        vec![yield_stmt(ident("e"))],
    )];
    let instance = instantiate(&mut engine, body);
    let first = instance.next(&mut engine, JsValue::Undefined).expect("first");
    assert_eq!(expect_yield(first), JsValue::Number(1.0));
    let caught = instance
        .throw(&mut engine, JsValue::string("boom"))
        .expect("throw should be caught");
    assert_eq!(expect_yield(caught), JsValue::string("boom"));
}

#[test]
#[allow(clippy::expect_used)]
fn test_injected_throw_uncaught_completes() {
    let mut engine = Engine::new();
    let instance = instantiate(&mut engine, vec![yield_stmt(num(1.0)), yield_stmt(num(2.0))]);
    instance.next(&mut engine, JsValue::Undefined).expect("first");
    let result = instance.throw(&mut engine, JsValue::string("boom"));
    assert!(matches!(result, Err(EngineError::Thrown(value)) if value == JsValue::string("boom")));
    assert!(instance.is_completed());
    let after = instance.next(&mut engine, JsValue::Undefined).expect("after");
    assert_eq!(expect_done(after), JsValue::Undefined);
}

#[test]
#[allow(clippy::expect_used)]
fn test_throw_before_start_completes() {
    let mut engine = Engine::new();
    let instance = instantiate(&mut engine, vec![yield_stmt(num(1.0))]);
    let result = instance.throw(&mut engine, JsValue::string("early"));
    assert!(matches!(result, Err(EngineError::Thrown(_))));
    assert!(instance.is_completed());
}

#[test]
#[allow(clippy::expect_used)]
fn test_return_before_start_completes() {
    let mut engine = Engine::new();
    let instance = instantiate(&mut engine, vec![yield_stmt(num(1.0))]);
    let event = instance
        .return_value(&mut engine, JsValue::Number(4.0))
        .expect("return");
    assert_eq!(expect_done(event), JsValue::Number(4.0));
    assert!(instance.is_completed());
}

#[test]
fn test_guest_throw_caught_with_finally_order() {
    let mut engine = Engine::new();
    // try { yield 1; throw "x"; } catch (e) { yield 2; } finally { yield 3; }
    let body = vec![try_catch_finally(
        vec![yield_stmt(num(1.0)), throw_(string("x"))],
        "e",
        vec![yield_stmt(num(2.0))],
        vec![yield_stmt(num(3.0))],
    )];
    let instance = instantiate(&mut engine, body);
    let (yields, done) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![1.0, 2.0, 3.0]);
    assert_eq!(done, JsValue::Undefined);
}

#[test]
fn test_delegation_forwards_and_captures_completion() {
    let mut engine = Engine::new();
    // function* inner() { yield 1; yield 2; return 3; }
    engine.define_generator(
        "inner",
        Vec::new(),
        vec![
            yield_stmt(num(1.0)),
            yield_stmt(num(2.0)),
            ret(Some(num(3.0))),
        ],
        FunctionKind::Generator,
    );
    // function* gen() { let x = yield* inner(); yield x; }
    let body = vec![
        let_("x", yield_star(call("inner", vec![]))),
        yield_stmt(ident("x")),
    ];
    let instance = instantiate(&mut engine, body);
    let (yields, _) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![1.0, 2.0, 3.0]);
}

#[test]
#[allow(clippy::expect_used)]
fn test_delegation_forwards_injected_throw() {
    let mut engine = Engine::new();
    // function* inner() { try { yield 1; } catch (e) { yield 42; } }
    engine.define_generator(
        "inner",
        Vec::new(),
        vec![try_catch(
            vec![yield_stmt(num(1.0))],
            "e",
            vec![yield_stmt(num(42.0))],
        )],
        FunctionKind::Generator,
    );
    let body = vec![expr_stmt(yield_star(call("inner", vec![])))];
    let instance = instantiate(&mut engine, body);
    let first = instance.next(&mut engine, JsValue::Undefined).expect("first");
    assert_eq!(expect_yield(first), JsValue::Number(1.0));
    let forwarded = instance
        .throw(&mut engine, JsValue::string("zap"))
        .expect("inner generator catches");
    assert_eq!(expect_yield(forwarded), JsValue::Number(42.0));
}

#[test]
fn test_delegation_over_array_literal() {
    let mut engine = Engine::new();
    let body = vec![expr_stmt(yield_star(array(vec![num(1.0), num(2.0)])))];
    let instance = instantiate(&mut engine, body);
    let (yields, done) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![1.0, 2.0]);
    assert_eq!(done, JsValue::Undefined);
}

#[test]
fn test_for_of_over_inner_generator() {
    let mut engine = Engine::new();
    engine.define_generator(
        "inner",
        Vec::new(),
        vec![yield_stmt(num(1.0)), yield_stmt(num(2.0))],
        FunctionKind::Generator,
    );
    // for (const v of inner()) { yield v + 10; }
    let body = vec![for_of(
        "v",
        call("inner", vec![]),
        vec![yield_stmt(add(ident("v"), num(10.0)))],
    )];
    let instance = instantiate(&mut engine, body);
    let (yields, _) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![11.0, 12.0]);
}

#[test]
fn test_switch_default_before_case_falls_through() {
    // switch (x) { default: yield 0; case 1: yield 1; break; case 2: yield 2; }
    let make_body = |x: f64| {
        vec![switch(
            num(x),
            vec![
                (None, vec![yield_stmt(num(0.0))]),
                (Some(num(1.0)), vec![yield_stmt(num(1.0)), brk(None)]),
                (Some(num(2.0)), vec![yield_stmt(num(2.0))]),
            ],
        )]
    };

    let mut engine = Engine::new();
    let instance = instantiate(&mut engine, make_body(5.0));
    let (yields, _) = collect_yields(&mut engine, &instance);
    // No case matches: default runs at its source position, then falls
    // through into case 1 and hits the break.
    assert_eq!(numbers(&yields), vec![0.0, 1.0]);

    let mut engine = Engine::new();
    let instance = instantiate(&mut engine, make_body(2.0));
    let (yields, _) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![2.0]);

    let mut engine = Engine::new();
    let instance = instantiate(&mut engine, make_body(1.0));
    let (yields, _) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![1.0]);
}

#[test]
fn test_labeled_break_leaves_outer_loop() {
    let mut engine = Engine::new();
    // outer: while (true) { while (true) { yield 1; break outer; } yield 99; }
    let body = vec![labeled(
        "outer",
        while_(
            boolean(true),
            vec![
                while_(
                    boolean(true),
                    vec![yield_stmt(num(1.0)), brk(Some("outer"))],
                ),
                yield_stmt(num(99.0)),
            ],
        ),
    )];
    let instance = instantiate(&mut engine, body);
    let (yields, done) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![1.0]);
    assert_eq!(done, JsValue::Undefined);
}

#[test]
fn test_labeled_continue_restarts_outer_loop() {
    let mut engine = Engine::new();
    // outer: for (let i = 0; i < 2; i = i + 1) {
    //   for (let j = 0; j < 2; j = j + 1) {
    //     if (j === 1) { continue outer; }
    //     yield i * 10 + j;
    //   }
    // }
    let body = vec![labeled(
        "outer",
        count_loop(
            "i",
            num(2.0),
            vec![count_loop(
                "j",
                num(2.0),
                vec![
                    if_(strict_eq(ident("j"), num(1.0)), vec![cont(Some("outer"))]),
                    yield_stmt(add(
                        bin(
                            jsgen::ast::BinaryOperator::Multiply,
                            ident("i"),
                            num(10.0),
                        ),
                        ident("j"),
                    )),
                ],
            )],
        ),
    )];
    let instance = instantiate(&mut engine, body);
    let (yields, _) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![0.0, 10.0]);
}

#[test]
#[allow(clippy::expect_used)]
fn test_break_out_of_try_runs_finally() {
    let mut engine = Engine::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    engine.define_native("record", move |_interp, args| {
        sink.borrow_mut()
            .push(args.first().cloned().unwrap_or(JsValue::Undefined));
        Ok(JsValue::Undefined)
    });
    // while (true) { try { yield 1; break; } finally { record(7); } } yield 2;
    let body = vec![
        while_(
            boolean(true),
            vec![try_finally(
                vec![yield_stmt(num(1.0)), brk(None)],
                vec![expr_stmt(call("record", vec![num(7.0)]))],
            )],
        ),
        yield_stmt(num(2.0)),
    ];
    let instance = instantiate(&mut engine, body);
    let (yields, _) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![1.0, 2.0]);
    assert_eq!(&*log.borrow(), &[JsValue::Number(7.0)]);
}

#[test]
#[allow(clippy::expect_used, clippy::panic)]
fn test_reentrant_next_is_rejected() {
    let mut engine = Engine::new();
    // function* gen() { poke(); yield 1; }  where poke() re-enters gen's
    // own iterator while it is executing.
    engine.define_generator(
        "gen",
        Vec::new(),
        vec![expr_stmt(call("poke", vec![])), yield_stmt(num(1.0))],
        FunctionKind::Generator,
    );
    engine
        .run_statements(&[let_("h", call("gen", vec![]))])
        .expect("instantiation");
    let handle = engine
        .interpreter()
        .global_env()
        .get(&jsgen::JsString::from("h"))
        .expect("global h");
    let poked = handle.clone();
    engine.define_native("poke", move |interp, _args| {
        let mut iterator = jsgen::runtime::get_iterator(&poked)?;
        iterator.next(interp, JsValue::Undefined).map(|step| step.value)
    });

    let instance = GeneratorInstance::from_value(&handle).expect("generator value");
    let result = instance.next(&mut engine, JsValue::Undefined);
    match result {
        Err(EngineError::Thrown(value)) => {
            assert!(value.to_string().contains("already running"));
        }
        other => panic!("expected reentrancy failure, got {other:?}"),
    }
}

#[test]
#[allow(clippy::expect_used)]
fn test_return_yield_suspends_then_returns() {
    let mut engine = Engine::new();
    // return yield 1;
    let body = vec![ret(Some(yield_(Some(num(1.0)))))];
    let instance = instantiate(&mut engine, body);
    let first = instance.next(&mut engine, JsValue::Undefined).expect("first");
    assert_eq!(expect_yield(first), JsValue::Number(1.0));
    let done = instance.next(&mut engine, JsValue::Number(8.0)).expect("second");
    assert_eq!(expect_done(done), JsValue::Number(8.0));
}

#[test]
#[allow(clippy::panic)]
fn test_generator_arguments_bind_as_locals() {
    let mut engine = Engine::new();
    let function = engine.define_generator(
        "range",
        vec![id("n")],
        vec![count_loop("i", ident("n"), vec![yield_stmt(ident("i"))])],
        FunctionKind::Generator,
    );
    let instance = engine
        .instantiate(&function, &[JsValue::Number(3.0)])
        .unwrap_or_else(|err| panic!("instantiation failed: {err}"));
    let (yields, _) = collect_yields(&mut engine, &instance);
    assert_eq!(numbers(&yields), vec![0.0, 1.0, 2.0]);
}

#[test]
#[allow(clippy::expect_used)]
fn test_instances_are_independent() {
    let mut engine = Engine::new();
    let function = engine.define_generator(
        "gen",
        Vec::new(),
        vec![yield_stmt(num(1.0)), yield_stmt(num(2.0))],
        FunctionKind::Generator,
    );
    let a = engine.instantiate(&function, &[]).expect("a");
    let b = engine.instantiate(&function, &[]).expect("b");
    assert_eq!(
        expect_yield(a.next(&mut engine, JsValue::Undefined).expect("a1")),
        JsValue::Number(1.0)
    );
    assert_eq!(
        expect_yield(a.next(&mut engine, JsValue::Undefined).expect("a2")),
        JsValue::Number(2.0)
    );
    // b is untouched by a's progress.
    assert_eq!(
        expect_yield(b.next(&mut engine, JsValue::Undefined).expect("b1")),
        JsValue::Number(1.0)
    );
}
