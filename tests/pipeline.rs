use spark::bytecode::{Chunk, Op};
use spark::frontend::tokenize;
use spark::frontend::token::TokenKind;
use spark::hardware::{Button, Hardware};
use spark::runtime::NullHost;
use spark::{
    Console, FaultKind, LoadError, Reload, Value, Vm, VmConfig, compile, demos, parse_source,
};

fn chunk_of(source: &str) -> Chunk {
    let program = parse_source(source).unwrap_or_else(|e| panic!("parse: {e}"));
    compile(&program).unwrap_or_else(|e| panic!("compile: {e}"))
}

fn boot(source: &str) -> Vm {
    let mut vm = Vm::new();
    vm.load(chunk_of(source), Reload::Cold);
    vm.boot(&mut NullHost);
    vm
}

fn number(vm: &Vm, name: &str) -> f64 {
    match vm.global(name) {
        Some(Value::Number(n)) => *n,
        other => panic!("{name} is {other:?}, expected a number"),
    }
}

const PROGRAMS: [&str; 6] = [
    "x = 1 + 2",
    "val = (10 + 2) * -2",
    "n = 5\nfact = 1\nwhile n > 0 do\nfact = fact * n\nn = n - 1\nend",
    "if 10 > 50 then res = 1 else res = 2 end",
    "function f(a)\nif a > 1 then\nreturn a\nelse\nreturn 0\nend\nend\nwhile f(3) < 0 do end",
    demos::BIOS,
];

#[test]
fn compiled_jump_targets_are_in_bounds() {
    for source in PROGRAMS.iter().chain([&demos::PLAYER]) {
        let chunk = chunk_of(source);
        for inst in chunk.instructions().unwrap() {
            if matches!(inst.op, Op::Jmp | Op::JmpIfFalse) {
                assert!((inst.a as usize) < chunk.code.len(), "{source}");
            }
        }
        chunk.validate().unwrap();
    }
}

#[test]
fn arithmetic_programs() {
    assert_eq!(number(&boot(PROGRAMS[0]), "x"), 3.0);
    assert_eq!(number(&boot(PROGRAMS[1]), "val"), -24.0);
    assert_eq!(number(&boot(PROGRAMS[2]), "fact"), 120.0);
    assert_eq!(number(&boot(PROGRAMS[3]), "res"), 2.0);
}

#[test]
fn string_concatenation() {
    let vm = boot("s = \"a\" + \"b\"");
    assert_eq!(vm.global("s"), Some(&Value::Str("ab".into())));
}

#[test]
fn bad_syscall_argument_leaves_state_untouched() {
    let mut vm = Vm::new();
    vm.load(chunk_of("k = 9\npset(\"x\", 0, 0)\nk = 10"), Reload::Cold);
    vm.boot(&mut NullHost);

    let fault = vm.fault().expect("pset with a string must fault");
    assert!(matches!(fault.kind, FaultKind::SyscallArgument { index: 0, .. }));
    assert!(vm.is_halted());
    assert_eq!(number(&vm, "k"), 9.0);
    assert_eq!(vm.globals().len(), 1);
    assert_eq!(vm.stack().len(), 3);
    assert_eq!(vm.ip(), fault.ip);
}

#[test]
fn division_by_zero_is_contained() {
    let vm = boot("a = 5\nb = a / 0");
    assert_eq!(vm.fault().map(|f| &f.kind), Some(&FaultKind::DivisionByZero));
    assert_eq!(vm.global("b"), None);
}

#[test]
fn rerun_is_deterministic() {
    let source = "n = 0\ni = 0\nwhile i < 50 do\nn = n + i * 3 % 7\ni = i + 1\nend\nmsg = \"n=\" + n";
    let mut vm = boot(source);
    let first = vm.globals().clone();

    vm.load(chunk_of(source), Reload::Cold);
    vm.boot(&mut NullHost);
    assert_eq!(vm.globals(), &first);

    vm.reset();
    vm.boot(&mut NullHost);
    assert_eq!(vm.globals(), &first);
}

#[test]
fn permissive_behaviors() {
    let vm = boot("a = undefined_thing\nb = no_such_fn(1, 2, 3) \nc = cls() + 1");
    assert!(vm.fault().is_none());
    assert_eq!(number(&vm, "a"), 0.0);
    assert_eq!(vm.global("b"), Some(&Value::Nil));
    assert_eq!(number(&vm, "c"), 1.0);
    assert!(vm.stack().is_empty());
}

#[test]
fn bios_draws_every_color() {
    let mut console = Console::new(Hardware::new());
    console.load_source(demos::BIOS).unwrap();
    assert!(console.tick().is_none());

    let histogram = console.host().color_histogram();
    assert!(histogram.iter().all(|&n| n == 160 * 5));
    assert_eq!(console.host().pixel(0, 0), Some(0));
    assert_eq!(console.host().pixel(159, 159), Some(31));
    assert_eq!(console.host().pixel(10, 42), Some(8));
}

#[test]
fn player_demo_moves() {
    let mut console = Console::new(Hardware::new());
    console.load_source(demos::PLAYER).unwrap();

    console.host_mut().set_button(Button::Down, true);
    console.host_mut().set_button(Button::A, true);
    for _ in 0..3 {
        assert!(console.tick().is_none());
    }

    assert_eq!(console.vm().global("player_y"), Some(&Value::Number(82.0)));
    assert_eq!(console.host().pixel(76, 82), Some(8));
    assert_eq!(console.host().pixel(76, 76), Some(0));
}

#[test]
fn failed_reload_keeps_running_cartridge() {
    let mut console = Console::new(Hardware::new());
    console.set_reload(Reload::Warm);
    console
        .load_source("t = 0\nfunction update()\nt = t + 1\nend")
        .unwrap();
    console.tick();

    let err = console.load_source("function update(\n").unwrap_err();
    assert!(matches!(err, LoadError::Parse(_)));
    console.tick();
    assert_eq!(console.vm().global("t"), Some(&Value::Number(2.0)));

    console
        .load_source("function update()\nt = t * 10\nend")
        .unwrap();
    console.tick();
    assert_eq!(console.vm().global("t"), Some(&Value::Number(20.0)));
}

#[test]
fn image_hand_off() {
    let image = chunk_of(demos::PLAYER).to_image().unwrap();
    let mut console = Console::new(Hardware::new());
    console.load_image(&image).unwrap();
    assert!(console.tick().is_none());
    assert_eq!(console.host().pixel(76, 76), Some(11));

    let mut corrupt = image.clone();
    corrupt.truncate(image.len() / 2);
    assert!(console.load_image(&corrupt).is_err());
    assert!(console.tick().is_none());
}

#[test]
fn budget_stops_runaway_entry_point() {
    let config = VmConfig {
        invoke_budget: Some(10_000),
        ..VmConfig::default()
    };
    let mut console = Console::with_config(Hardware::new(), config);
    console
        .load_source("function update()\nwhile 1 do end\nend")
        .unwrap();
    let fault = console.tick().cloned().unwrap();
    assert_eq!(fault.kind, FaultKind::BudgetExhausted { budget: 10_000 });
}

#[test]
fn lexer_never_fails() {
    let tokens = tokenize("x = \"open\n@ 7.");
    assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Unknown));
    assert!(parse_source("x = \"open\n@ 7.").is_err());
}
