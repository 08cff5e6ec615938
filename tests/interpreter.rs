use std::{cell::RefCell, rc::Rc};

use osier::{
    concurrency::Simulator,
    debugger::{DebugCommand, DebugHandler},
    diagnostics::{ErrorKind, OsierError},
    environment::MAX_CALL_DEPTH,
    runtime::{Interpreter, Outcome},
};

fn run(source: &str) -> Outcome {
    let mut interpreter = Interpreter::new();
    interpreter.run(source)
}

fn run_ok(source: &str) -> Outcome {
    let outcome = run(source);
    if let Some(err) = &outcome.error {
        panic!("expected a clean run, got {err}\noutput: {:?}", outcome.output);
    }
    outcome
}

fn run_error(source: &str) -> (Vec<String>, OsierError) {
    let outcome = run(source);
    match outcome.error {
        Some(err) => (outcome.output, err),
        None => panic!("expected an error, got output {:?}", outcome.output),
    }
}

fn value_text(outcome: &Outcome) -> String {
    outcome
        .value
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_default()
}

#[derive(Default)]
struct DebugLog {
    pauses: Vec<(usize, String)>,
    shown: Vec<String>,
}

struct ScriptedHandler {
    plan: std::vec::IntoIter<DebugCommand>,
    log: Rc<RefCell<DebugLog>>,
}

impl DebugHandler for ScriptedHandler {
    fn on_pause(&mut self, line: usize, statement: &str) -> DebugCommand {
        self.log
            .borrow_mut()
            .pauses
            .push((line, statement.to_string()));
        self.plan.next().unwrap_or(DebugCommand::Continue)
    }

    fn show(&mut self, text: &str) {
        self.log.borrow_mut().shown.push(text.to_string());
    }
}

fn scripted(plan: &[DebugCommand]) -> (ScriptedHandler, Rc<RefCell<DebugLog>>) {
    let log = Rc::new(RefCell::new(DebugLog::default()));
    let handler = ScriptedHandler {
        plan: plan.to_vec().into_iter(),
        log: Rc::clone(&log),
    };
    (handler, log)
}

#[test]
fn assigns_and_prints_variable() {
    let outcome = run_ok("y = 5\nprint y\n");
    assert_eq!(outcome.output, vec!["5"]);
}

#[test]
fn print_joins_operands_with_spaces() {
    let outcome = run_ok("print \"value:\", 42\n");
    assert_eq!(outcome.output, vec!["value: 42"]);
}

#[test]
fn expressions_follow_precedence() {
    let outcome = run_ok("print 2 + 3 * 4\n");
    assert_eq!(outcome.output, vec!["14"]);
}

#[test]
fn unevaluable_operand_prints_its_own_text() {
    let outcome = run_ok("print hello world\n");
    assert_eq!(outcome.output, vec!["hello world"]);

    let outcome = run_ok("x = fast and loose\nprint x\n");
    assert_eq!(outcome.output, vec!["fast and loose"]);
}

#[test]
fn arithmetic_on_strings_falls_back_to_the_literal() {
    let outcome = run_ok("x = \"5\" + 1\nprint x\n");
    assert_eq!(outcome.output, vec!["\"5\" + 1"]);

    let outcome = run_ok("x = -\"5\"\nprint x\n");
    assert_eq!(outcome.output, vec!["-\"5\""]);
}

#[test]
fn memory_write_then_read() {
    let outcome = run_ok(concat!(
        "memory allocate buf 4\n",
        "memory write buf 0 9\n",
        "print memory read buf 0\n",
    ));
    assert_eq!(outcome.output, vec!["9"]);
}

#[test]
fn memory_read_covers_all_written_indices() {
    let mut source = String::from("heap alloc buf 4\n");
    for index in 0..4 {
        source.push_str(&format!("memory write buf {index} {}\n", 10 + index));
    }
    for index in 0..4 {
        source.push_str(&format!("print memory read buf {index}\n"));
    }
    let outcome = run_ok(&source);
    assert_eq!(outcome.output, vec!["10", "11", "12", "13"]);
}

#[test]
fn fresh_slots_read_as_zero() {
    let outcome = run_ok("vmem allocate buf 2\nprint memory read buf 1\n");
    assert_eq!(outcome.output, vec!["0"]);
}

#[test]
fn out_of_bounds_read_is_reported_and_run_continues() {
    let (output, err) = run_error(concat!(
        "heap alloc buf 2\n",
        "memory read buf 5\n",
        "print done\n",
    ));
    assert_eq!(err.kind(), ErrorKind::Memory);
    assert_eq!(
        output,
        vec![
            "Error (line 2): memory error: index 5 out of bounds for allocation of size 2",
            "done",
        ]
    );
}

#[test]
fn use_after_free_is_reported() {
    let (output, err) = run_error(concat!(
        "heap alloc buf 2\n",
        "heap free buf\n",
        "memory read buf 0\n",
    ));
    assert_eq!(err.kind(), ErrorKind::Memory);
    assert!(output[0].contains("use after free"), "{output:?}");
}

#[test]
fn free_requires_matching_space() {
    let (output, err) = run_error("heap alloc buf 2\nvmem free buf\n");
    assert_eq!(err.kind(), ErrorKind::Memory);
    assert!(
        output[0].contains("expected a vmem handle, found a heap handle"),
        "{output:?}"
    );
}

#[test]
fn swap_round_trip_preserves_contents() {
    let outcome = run_ok(concat!(
        "paging alloc frame 2\n",
        "memory write frame 0 7\n",
        "swap out frame\n",
        "swap in frame\n",
        "print memory read frame 0\n",
    ));
    assert_eq!(outcome.output, vec!["7"]);
}

#[test]
fn reading_swapped_out_page_is_reported() {
    let (output, err) = run_error(concat!(
        "paging alloc frame 2\n",
        "swap out frame\n",
        "memory read frame 0\n",
    ));
    assert_eq!(err.kind(), ErrorKind::Memory);
    assert!(output[0].contains("is swapped out"), "{output:?}");
}

#[test]
fn swap_out_rejects_non_page_handles() {
    let (output, err) = run_error("heap alloc buf 1\nswap out buf\n");
    assert_eq!(err.kind(), ErrorKind::Memory);
    assert!(
        output[0].contains("expected a page handle, found a heap handle"),
        "{output:?}"
    );
}

#[test]
fn stack_pops_in_lifo_order() {
    let outcome = run_ok("stack push 41\nstack push 1\nstack pop\n");
    assert_eq!(value_text(&outcome), "1");
}

#[test]
fn popping_empty_stack_is_reported() {
    let (output, err) = run_error("stack pop\n");
    assert_eq!(err.kind(), ErrorKind::Memory);
    assert!(output[0].contains("stack is empty"), "{output:?}");
}

#[test]
fn gc_reports_and_collects_unreachable_allocations() {
    let outcome = run_ok(concat!(
        "heap alloc keep 2\n",
        "heap alloc lose 2\n",
        "lose = 0\n",
        "gc run\n",
        "print memory read keep 0\n",
    ));
    assert_eq!(outcome.output, vec!["GC collected 1 allocation(s)", "0"]);
}

#[test]
fn gc_marks_through_object_attributes() {
    let outcome = run_ok(concat!(
        "class Box:\n",
        "    item = 0\n",
        "object new box Box\n",
        "heap alloc h 2\n",
        "object set box item h\n",
        "h = 0\n",
        "gc run\n",
    ));
    assert_eq!(outcome.output, vec!["GC collected 0 allocation(s)"]);
}

#[test]
fn while_counts_up() {
    let outcome = run_ok(concat!(
        "count = 0\n",
        "while count < 3:\n",
        "    print count\n",
        "    count = count + 1\n",
    ));
    assert_eq!(outcome.output, vec!["0", "1", "2"]);
}

#[test]
fn if_branches_on_truthiness() {
    let outcome = run_ok(concat!(
        "x = 0\n",
        "if x:\n",
        "    print yes\n",
        "if x == 0:\n",
        "    print zero\n",
    ));
    assert_eq!(outcome.output, vec!["zero"]);
}

#[test]
fn functions_return_values() {
    let outcome = run_ok(concat!(
        "function add(a, b):\n",
        "    return a + b\n",
        "call add(2, 3)\n",
    ));
    assert_eq!(value_text(&outcome), "5");
}

#[test]
fn arity_mismatch_reports_without_running_body() {
    let (output, err) = run_error(concat!(
        "function shout(word):\n",
        "    print word\n",
        "call shout()\n",
        "print done\n",
    ));
    assert_eq!(err.kind(), ErrorKind::Arity);
    assert_eq!(
        output,
        vec![
            "Error (line 3): arity error: function 'shout' expects 1 arguments, but got 0",
            "done",
        ]
    );
}

#[test]
fn function_locals_do_not_leak() {
    let outcome = run_ok(concat!(
        "function set_local():\n",
        "    local = 42\n",
        "call set_local()\n",
        "print local\n",
    ));
    assert_eq!(outcome.output, vec!["local"]);
}

#[test]
fn globals_are_visible_inside_functions() {
    let outcome = run_ok(concat!(
        "g = 7\n",
        "function show():\n",
        "    print g\n",
        "call show()\n",
    ));
    assert_eq!(outcome.output, vec!["7"]);
}

#[test]
fn parameters_shadow_globals() {
    let outcome = run_ok(concat!(
        "x = 1\n",
        "function show(x):\n",
        "    print x\n",
        "call show(9)\n",
        "print x\n",
    ));
    assert_eq!(outcome.output, vec!["9", "1"]);
}

#[test]
fn runaway_recursion_is_reported() {
    let (output, err) = run_error(concat!(
        "function dive():\n",
        "    call dive()\n",
        "call dive()\n",
    ));
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(output[0].contains("call depth limit"), "{output:?}");
}

#[test]
fn recursion_to_the_depth_limit_completes() {
    let program = format!(
        concat!(
            "function dive(n):\n",
            "    if n > 1:\n",
            "        call dive(n - 1)\n",
            "call dive({depth})\n",
            "print \"done\"\n",
        ),
        depth = MAX_CALL_DEPTH
    );
    let outcome = run_ok(&program);
    assert_eq!(outcome.output, vec!["done"]);
}

#[test]
fn class_defaults_methods_and_self() {
    let outcome = run_ok(concat!(
        "class Counter:\n",
        "    total = 0\n",
        "    function bump(amount):\n",
        "        object set self total amount\n",
        "        return amount\n",
        "object new c Counter\n",
        "print object get c total\n",
        "c.bump(5)\n",
        "print object get c total\n",
    ));
    assert_eq!(outcome.output, vec!["0", "5"]);
}

#[test]
fn instances_do_not_share_attributes() {
    let outcome = run_ok(concat!(
        "class Pair:\n",
        "    left = 1\n",
        "object new a Pair\n",
        "object new b Pair\n",
        "object set a left 9\n",
        "print object get a left\n",
        "print object get b left\n",
    ));
    assert_eq!(outcome.output, vec!["9", "1"]);
}

#[test]
fn missing_method_is_a_name_error() {
    let (output, err) = run_error(concat!(
        "class Empty:\n",
        "    zero = 0\n",
        "object new e Empty\n",
        "e.vanish()\n",
    ));
    assert_eq!(err.kind(), ErrorKind::Name);
    assert!(output[0].contains("has no method `vanish`"), "{output:?}");
}

#[test]
fn missing_attribute_is_a_name_error() {
    let (_, err) = run_error(concat!(
        "class Empty:\n",
        "    zero = 0\n",
        "object new e Empty\n",
        "object get e ghost\n",
    ));
    assert_eq!(err.kind(), ErrorKind::Name);
}

#[test]
fn catch_binds_the_error_message() {
    let outcome = run_ok(concat!(
        "try:\n",
        "    throw boom\n",
        "catch err:\n",
        "    print caught, err\n",
        "finally:\n",
        "    print cleanup\n",
        "print after\n",
    ));
    assert!(outcome.error.is_none());
    assert_eq!(outcome.output, vec!["caught boom", "cleanup", "after"]);
}

#[test]
fn finally_runs_before_an_uncaught_error_is_reported() {
    let (output, err) = run_error(concat!(
        "try:\n",
        "    memory read nope 0\n",
        "finally:\n",
        "    print cleanup\n",
        "print after\n",
    ));
    assert_eq!(err.kind(), ErrorKind::Name);
    assert_eq!(output[0], "cleanup");
    assert!(output[1].starts_with("Error (line 1):"), "{output:?}");
    assert_eq!(output[2], "after");
}

#[test]
fn uncaught_throw_reports_its_message() {
    let (output, err) = run_error("throw kaboom\n");
    assert_eq!(err.kind(), ErrorKind::Thrown);
    assert_eq!(output, vec!["Error (line 1): kaboom"]);
}

#[test]
fn lock_acquire_is_idempotent() {
    let outcome = run_ok("lock m\nlock m\nunlock m\nprint ok\n");
    assert_eq!(outcome.output, vec!["ok"]);
}

#[test]
fn releasing_an_unheld_lock_is_reported() {
    let (output, err) = run_error("lock m\nunlock m\nunlock m\n");
    assert_eq!(err.kind(), ErrorKind::Concurrency);
    assert!(output[0].contains("lock `m` is not held"), "{output:?}");
}

#[test]
fn joining_an_unknown_thread_is_reported() {
    let (_, err) = run_error("join ghost\n");
    assert_eq!(err.kind(), ErrorKind::Concurrency);
}

#[test]
fn duplicate_thread_is_reported() {
    let (output, err) = run_error("thread t\nthread t\n");
    assert_eq!(err.kind(), ErrorKind::Concurrency);
    assert!(output[0].contains("already exists"), "{output:?}");
}

#[test]
fn tasks_run_by_delay_then_priority() {
    let outcome = run_ok(concat!(
        "task slow after 3s priority 5\n",
        "task quick after 1s priority 1\n",
        "task mid after 2s priority 9\n",
        "task tie after 1s priority 9\n",
        "task start\n",
    ));
    assert_eq!(
        outcome.output,
        vec![
            "Running task 'tie' (delay 1s, priority 9)",
            "Running task 'quick' (delay 1s, priority 1)",
            "Running task 'mid' (delay 2s, priority 9)",
            "Running task 'slow' (delay 3s, priority 5)",
        ]
    );
}

#[test]
fn rescheduling_a_task_replaces_it() {
    let outcome = run_ok(concat!(
        "task a after 5s\n",
        "task a after 1s priority 2\n",
        "task start\n",
    ));
    assert_eq!(outcome.output, vec!["Running task 'a' (delay 1s, priority 2)"]);
}

#[test]
fn starting_with_no_tasks_is_silent() {
    let outcome = run_ok("task start\nprint done\n");
    assert_eq!(outcome.output, vec!["done"]);
}

#[test]
fn process_lifecycle_and_double_terminate() {
    let (output, err) = run_error(concat!(
        "process create batcher 10\n",
        "process terminate batcher\n",
        "process terminate batcher\n",
    ));
    assert_eq!(err.kind(), ErrorKind::Concurrency);
    assert!(output[0].contains("unknown process `batcher`"), "{output:?}");
}

#[test]
fn simulator_records_thread_and_lock_state() {
    let mut sim = Simulator::new();
    sim.create_thread("worker").unwrap();
    assert!(sim.thread("worker").unwrap().alive);
    sim.join_thread("worker").unwrap();
    assert!(!sim.thread("worker").unwrap().alive);
    sim.acquire_lock("m");
    assert!(sim.lock("m").unwrap().held);
    sim.release_lock("m").unwrap();
    assert!(!sim.lock("m").unwrap().held);
}

#[test]
fn simulator_counts_and_drains_pending_tasks() {
    let mut sim = Simulator::new();
    sim.schedule_task("a", 5.0, 1);
    sim.schedule_task("b", 2.0, 1);
    sim.schedule_task("a", 3.0, 1);
    assert_eq!(sim.pending_tasks(), 2);
    let order: Vec<String> = sim.start_tasks().into_iter().map(|task| task.name).collect();
    assert_eq!(order, ["b", "a"]);
    assert_eq!(sim.pending_tasks(), 0);
}

#[test]
fn simulator_tracks_processes_until_terminated() {
    let mut sim = Simulator::new();
    sim.create_process("batcher", 10).unwrap();
    assert_eq!(sim.process("batcher").unwrap().priority, 10);
    sim.terminate_process("batcher").unwrap();
    assert!(sim.process("batcher").is_none());
}

#[test]
fn stdlib_math_and_string_results() {
    let outcome = run_ok(concat!(
        "print math.sqrt(49)\n",
        "print math.max(3, 9)\n",
        "print string.upper(\"osier\")\n",
        "print string.substring(\"hello\", 1, 3)\n",
        "parts = string.split(\"a-b-c\", \"-\")\n",
        "print string.join(parts, \"+\")\n",
    ));
    assert_eq!(outcome.output, vec!["7", "9", "OSIER", "el", "a+b+c"]);
}

#[test]
fn substring_counts_negative_indices_from_the_end() {
    let outcome = run_ok(concat!(
        "print string.substring(\"hello\", 0 - 3, 5)\n",
        "print string.substring(\"hello\", 0, 0 - 1)\n",
        "print string.substring(\"hello\", 0 - 99, 2)\n",
    ));
    assert_eq!(outcome.output, vec!["llo", "hell", "he"]);
}

#[test]
fn replace_with_empty_search_interleaves() {
    let outcome = run_ok("print string.replace(\"abc\", \"\", \"-\")\n");
    assert_eq!(outcome.output, vec!["-a-b-c-"]);
}

#[test]
fn stdlib_failures_are_strings_not_engine_errors() {
    let outcome = run_ok("print math.sqrt(-1)\n");
    assert!(outcome.error.is_none());
    assert_eq!(
        outcome.output,
        vec!["Error: math.sqrt() expects a non-negative argument"]
    );
}

#[test]
fn stdlib_arity_failures_name_the_function() {
    let outcome = run_ok("print math.pow(2)\n");
    assert_eq!(
        outcome.output,
        vec!["Error: math.pow() takes exactly 2 arguments, got 1"]
    );
}

#[test]
fn stdlib_failure_values_carry_the_error_prefix() {
    let outcome = run_ok("math.sqrt(-1)\n");
    let value = outcome.value.expect("stdlib statement should yield a value");
    assert!(value.is_error_string());
}

#[test]
fn json_round_trips_through_strings() {
    let outcome = run_ok(concat!(
        "data = json.parse(\"[1, 2, 3]\")\n",
        "print data\n",
        "print json.stringify(data)\n",
    ));
    assert_eq!(outcome.output, vec!["[1, 2, 3]", "[1,2,3]"]);
}

#[test]
fn seeded_random_is_deterministic() {
    let source = "print random.int(1, 100)\nprint random.int(1, 100)\n";
    let mut first = Interpreter::new();
    first.seed_random(42);
    let one = first.run(source);
    let mut second = Interpreter::new();
    second.seed_random(42);
    let two = second.run(source);
    assert_eq!(one.output, two.output);
}

#[test]
fn system_exit_stops_the_run() {
    let mut interpreter = Interpreter::new();
    let outcome = interpreter.run("print one\nsystem.exit(3)\nprint two\n");
    assert_eq!(outcome.output, vec!["one"]);
    assert_eq!(interpreter.exit_code(), Some(3));
}

#[test]
fn unknown_commands_are_reported_and_skipped() {
    let outcome = run_ok("frobnicate the widgets\nprint ok\n");
    assert_eq!(
        outcome.output,
        vec!["Unknown command (line 1): frobnicate the widgets", "ok"]
    );
}

#[test]
fn import_and_export_are_reported_unsupported() {
    let outcome = run_ok("import widgets\nexport gadgets\nprint on\n");
    assert_eq!(
        outcome.output,
        vec![
            "import 'widgets' is not supported",
            "export 'gadgets' is not supported",
            "on",
        ]
    );
}

#[test]
fn parse_errors_abort_the_batch() {
    let outcome = run(concat!(
        "print before\n",
        "if x > 1\n",
        "    print inside\n",
        "while\n",
    ));
    let err = outcome.error.expect("syntax errors expected");
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(outcome.output.len() >= 2, "{:?}", outcome.output);
    assert!(
        outcome.output.iter().all(|line| line.starts_with("Syntax error")),
        "{:?}",
        outcome.output
    );
    assert!(!outcome.output.iter().any(|line| line == "before"));
}

#[test]
fn misaligned_indentation_is_a_syntax_error() {
    let outcome = run("if 1:\n   print x\n");
    let err = outcome.error.expect("syntax error expected");
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(
        outcome.output[0].contains("multiple of 4"),
        "{:?}",
        outcome.output
    );
}

#[test]
fn execute_line_reports_against_the_caller_line_number() {
    let mut interpreter = Interpreter::new();
    let outcome = interpreter.execute_line("memory read buf 0", 10);
    assert!(
        outcome.output[0].starts_with("Error (line 10):"),
        "{:?}",
        outcome.output
    );
}

#[test]
fn execute_line_builds_on_prior_state() {
    let mut interpreter = Interpreter::new();
    interpreter.execute_line("x = 4", 1);
    let outcome = interpreter.execute_line("print x", 2);
    assert_eq!(outcome.output, vec!["4"]);
}

#[test]
fn reset_clears_program_state_but_keeps_breakpoints() {
    let mut interpreter = Interpreter::new();
    interpreter.set_breakpoint(2);
    let first = interpreter.run("x = 5\nprint x\n");
    assert_eq!(first.output, vec!["5"]);
    interpreter.reset();
    let second = interpreter.run("print x\n");
    assert_eq!(second.output, vec!["x"]);
    assert_eq!(interpreter.list_breakpoints(), vec![2]);
}

#[test]
fn runs_are_deterministic_across_reset() {
    let source = concat!(
        "heap alloc buf 2\n",
        "print buf\n",
        "task late after 2s\n",
        "task soon after 1s\n",
        "task start\n",
    );
    let mut interpreter = Interpreter::new();
    let first = interpreter.run(source);
    interpreter.reset();
    let second = interpreter.run(source);
    assert_eq!(first.output, second.output);
}

#[test]
fn breakpoint_pauses_and_answers_inspection() {
    let (handler, log) = scripted(&[DebugCommand::Variables, DebugCommand::Continue]);
    let mut interpreter = Interpreter::new();
    interpreter.set_debug_handler(Box::new(handler));
    interpreter.set_debug(true);
    interpreter.set_breakpoint(3);
    let outcome = interpreter.run("a = 1\nb = 2\nprint c\nprint done\n");
    assert!(outcome.error.is_none());
    assert_eq!(outcome.output, vec!["c", "done"]);
    let log = log.borrow();
    // Inspection keeps the pause open at line 3.
    assert_eq!(log.pauses.len(), 2);
    assert_eq!(log.pauses[0], (3, "print c".to_string()));
    assert!(log.shown[0].contains("a = 1"), "{:?}", log.shown);
    assert!(log.shown[0].contains("b = 2"), "{:?}", log.shown);
}

#[test]
fn step_mode_pauses_before_every_statement() {
    let (handler, log) = scripted(&[
        DebugCommand::Step,
        DebugCommand::Step,
        DebugCommand::Step,
        DebugCommand::Continue,
    ]);
    let mut interpreter = Interpreter::new();
    interpreter.set_debug_handler(Box::new(handler));
    interpreter.set_debug(true);
    interpreter.step();
    interpreter.run("a = 1\nb = 2\nc = 3\nprint done\n");
    let lines: Vec<usize> = log.borrow().pauses.iter().map(|(line, _)| *line).collect();
    assert_eq!(lines, vec![1, 2, 3, 4]);
}

#[test]
fn quit_disables_debugging_for_the_rest_of_the_run() {
    let (handler, log) = scripted(&[DebugCommand::Quit]);
    let mut interpreter = Interpreter::new();
    interpreter.set_debug_handler(Box::new(handler));
    interpreter.set_debug(true);
    interpreter.step();
    let outcome = interpreter.run("a = 1\nb = 2\nprint done\n");
    assert_eq!(outcome.output, vec!["done"]);
    assert_eq!(log.borrow().pauses.len(), 1);
}

#[test]
fn debug_statements_inspect_into_program_output() {
    let outcome = run_ok("a = 1\ndebug variables\n");
    assert!(outcome.output[0].contains("a = 1"), "{:?}", outcome.output);

    let outcome = run_ok("breakpoint set 3\nbreakpoint set 1\nbreakpoint list\n");
    assert_eq!(outcome.output, vec!["Breakpoints: 1, 3"]);

    let outcome = run_ok("breakpoint list\n");
    assert_eq!(outcome.output, vec!["No breakpoints set"]);
}

#[test]
fn debug_memory_statement_reports_counts() {
    let outcome = run_ok("heap alloc buf 2\nstack push 1\ndebug memory\n");
    assert_eq!(
        outcome.output,
        vec!["heap: 1 allocation(s), vmem: 0, pages: 0, swap: 0, stack depth: 1"]
    );
}

#[test]
fn demo_scripts_run_cleanly() {
    for script in [
        "demos/quickstart.osr",
        "demos/memory.osr",
        "demos/tasks.osr",
    ] {
        let source = std::fs::read_to_string(script)
            .unwrap_or_else(|err| panic!("failed to read {script}: {err}"));
        let mut interpreter = Interpreter::new();
        let outcome = interpreter.run(&source);
        assert!(
            outcome.error.is_none(),
            "{script} should run cleanly, got {:?}",
            outcome.output
        );
    }
}
