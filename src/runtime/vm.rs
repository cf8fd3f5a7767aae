use std::collections::HashMap;

use crate::bytecode::ir::{Chunk, Instruction};
use crate::bytecode::op::Op;
use crate::bytecode::syscall::{BUTTON_COUNT, PALETTE_SIZE, Syscall, SyscallSpec};
use crate::lang::value::Value;
use crate::runtime::host::Host;
use crate::runtime::runtime_error::{Fault, FaultKind};

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Instructions executed per `step`.
    pub slice: usize,
    /// Check syscall arity and argument kinds before dispatch.
    pub check_syscalls: bool,
    pub max_stack: usize,
    pub max_call_depth: usize,
    /// Instruction cap for one `boot` or `call_function`.
    pub invoke_budget: Option<usize>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            slice: 60,
            check_syscalls: true,
            max_stack: 1024,
            max_call_depth: 256,
            invoke_budget: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Running,
    Halted,
}

/// What happens to globals when a new chunk is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    /// Keep globals: the new code sees the old cartridge's state.
    Warm,
    /// Start from an empty global table.
    Cold,
}

type Exec<T> = Result<T, FaultKind>;

/// Stack VM executing a compiled [`Chunk`].
///
/// Runs cooperatively: the host drives it in bounded slices (`step`) or
/// one entry point at a time (`call_function`). A fault halts the VM and is
/// kept until the next `reset`/`load`; the host polls it with `fault()`.
pub struct Vm {
    chunk: Chunk,
    stack: Vec<Value>,
    globals: HashMap<String, Value>,
    returns: Vec<usize>,
    ip: usize,
    state: VmState,
    fault: Option<Fault>,
    cycles: u64,
    config: VmConfig,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            chunk: Chunk::new(),
            stack: Vec::new(),
            globals: HashMap::new(),
            returns: Vec::new(),
            ip: 0,
            state: VmState::Running,
            fault: None,
            cycles: 0,
            config,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut VmConfig {
        &mut self.config
    }

    /// Replaces the running chunk and resets execution state.
    ///
    /// A warm reload keeps globals, except function slots the old chunk
    /// declared that still point into its code.
    pub fn load(&mut self, chunk: Chunk, reload: Reload) {
        match reload {
            Reload::Cold => self.globals.clear(),
            Reload::Warm => self.forget_functions(),
        }
        self.chunk = chunk;
        self.reset();
        log::info!(
            "loaded cartridge: {} code words, {} constants ({:?})",
            self.chunk.len(),
            self.chunk.constants.len(),
            reload
        );
    }

    fn forget_functions(&mut self) {
        for entry in &self.chunk.functions {
            let stale = matches!(
                self.globals.get(&entry.name),
                Some(Value::Number(n)) if *n == f64::from(entry.addr)
            );
            if stale {
                self.globals.remove(&entry.name);
            }
        }
    }

    /// Back to the first instruction with empty stacks and no fault.
    /// Globals are kept.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.returns.clear();
        self.ip = 0;
        self.state = VmState::Running;
        self.fault = None;
        self.cycles = 0;
    }

    /// Runs top-level code until it halts.
    ///
    /// A clean `HALT` leaves the VM running and idle, ready for
    /// `call_function`; a fault leaves it halted.
    pub fn boot(&mut self, host: &mut dyn Host) {
        let mut executed = 0;
        while self.state == VmState::Running {
            if !self.charge(executed) {
                return;
            }
            self.execute(host);
            executed += 1;
        }

        if self.fault.is_none() {
            self.state = VmState::Running;
            log::debug!("boot finished after {} instructions", executed);
        }
    }

    /// Executes at most `slice` instructions.
    pub fn step(&mut self, host: &mut dyn Host) {
        for _ in 0..self.config.slice {
            if self.state != VmState::Running {
                break;
            }
            self.execute(host);
        }
    }

    /// Calls a cartridge function by name with no arguments and runs it to
    /// completion. Returns whether the function existed.
    ///
    /// A `HALT` inside the function ends the invocation early. Any value the
    /// function leaves on the stack is discarded.
    pub fn call_function(&mut self, name: &str, host: &mut dyn Host) -> bool {
        if self.fault.is_some() {
            return false;
        }
        let Some(addr) = self.function_address(name) else {
            return false;
        };

        if self.returns.len() >= self.config.max_call_depth {
            self.raise(FaultKind::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
            return true;
        }

        let depth = self.returns.len();
        let base = self.stack.len();
        let saved_ip = self.ip;

        // returning to one past the end lands outside the code; the loop
        // below stops before that address is ever fetched
        self.returns.push(self.chunk.len());
        self.ip = addr;
        self.state = VmState::Running;

        let mut executed = 0;
        while self.state == VmState::Running && self.returns.len() > depth {
            if !self.charge(executed) {
                return true;
            }
            self.execute(host);
            executed += 1;
        }

        if self.fault.is_some() {
            return true;
        }

        self.returns.truncate(depth);
        if self.stack.len() > base {
            self.stack.pop();
        }
        self.ip = saved_ip;
        self.state = VmState::Running;
        log::trace!("{}() ran {} instructions", name, executed);
        true
    }

    // Accessors

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn globals(&self) -> &HashMap<String, Value> {
        &self.globals
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == VmState::Halted
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    // Execution

    /// False (and faults) once `executed` reaches the invocation budget.
    fn charge(&mut self, executed: usize) -> bool {
        if let Some(budget) = self.config.invoke_budget {
            if executed >= budget {
                self.raise(FaultKind::BudgetExhausted { budget });
                return false;
            }
        }
        true
    }

    fn execute(&mut self, host: &mut dyn Host) {
        match self.exec_one(host) {
            Ok(()) => self.cycles += 1,
            Err(kind) => self.raise(kind),
        }
    }

    fn raise(&mut self, kind: FaultKind) {
        let fault = Fault { kind, ip: self.ip };
        log::warn!("cartridge fault: {}", fault);
        self.fault = Some(fault);
        self.state = VmState::Halted;
    }

    /// Executes the instruction at `ip`. On error nothing has been mutated
    /// and `ip` still points at the instruction.
    fn exec_one(&mut self, host: &mut dyn Host) -> Exec<()> {
        if self.ip >= self.chunk.len() {
            return Err(FaultKind::IpOutOfRange);
        }
        let inst = self.chunk.decode_at(self.ip)?;
        let next = inst.next_addr();

        match inst.op {
            Op::Halt => {
                self.state = VmState::Halted;
                return Ok(());
            }

            // Data
            Op::LoadConst => {
                let value = self.constant(inst.a)?.clone();
                self.push(value)?;
            }
            Op::LoadGlobal => {
                let name = self.name(inst.a)?;
                let value = self
                    .globals
                    .get(name)
                    .cloned()
                    .unwrap_or(Value::Number(0.0));
                self.push(value)?;
            }
            Op::StoreGlobal => {
                let name = self.name(inst.a)?.to_string();
                let value = self.pop()?;
                self.globals.insert(name, value);
            }
            Op::Pop => {
                self.pop()?;
            }

            // Arithmetic
            Op::Add => {
                let (a, b) = self.peek_pair()?;
                let sum = match (a.as_number(), b.as_number()) {
                    (Some(x), Some(y)) => Value::Number(x + y),
                    _ => Value::Str(format!("{}{}", a, b)),
                };
                self.replace(2, sum);
            }
            Op::Sub => self.arith("SUB", |x, y| Ok(x - y))?,
            Op::Mul => self.arith("MUL", |x, y| Ok(x * y))?,
            Op::Div => self.arith("DIV", |x, y| {
                if y == 0.0 {
                    Err(FaultKind::DivisionByZero)
                } else {
                    Ok(x / y)
                }
            })?,
            Op::Mod => self.arith("MOD", |x, y| {
                if y == 0.0 {
                    return Err(FaultKind::ModuloByZero);
                }
                // floored: the result takes the divisor's sign
                let r = x % y;
                Ok(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r })
            })?,
            Op::Neg => {
                let value = self.peek(0)?;
                let n = value
                    .as_number()
                    .ok_or_else(|| type_mismatch("NEG", "a number", value))?;
                self.replace(1, Value::Number(-n));
            }

            // Comparison
            Op::Eq | Op::Neq => {
                let (a, b) = self.peek_pair()?;
                let equal = a.loose_eq(b);
                self.replace(2, Value::Bool(equal == (inst.op == Op::Eq)));
            }
            Op::Lt => self.compare("LT", |o| o.is_lt())?,
            Op::Lte => self.compare("LTE", |o| o.is_le())?,
            Op::Gt => self.compare("GT", |o| o.is_gt())?,
            Op::Gte => self.compare("GTE", |o| o.is_ge())?,

            // Control flow
            Op::Jmp => {
                self.ip = inst.a as usize;
                return Ok(());
            }
            Op::JmpIfFalse => {
                let cond = self.pop()?;
                self.ip = if cond.is_truthy() { next } else { inst.a as usize };
                return Ok(());
            }
            Op::Call => return self.exec_call(&inst),
            Op::Ret => {
                match self.returns.pop() {
                    Some(addr) => self.ip = addr,
                    None => self.state = VmState::Halted,
                }
                return Ok(());
            }
            Op::Sys => self.exec_sys(&inst, host)?,
        }

        self.ip = next;
        Ok(())
    }

    fn exec_call(&mut self, inst: &Instruction) -> Exec<()> {
        let argc = inst.a as usize;
        if self.stack.len() < argc + 1 {
            return Err(FaultKind::StackUnderflow);
        }
        let target = self.resolve_callee(self.peek(0)?);

        match target {
            Some(addr) => {
                if self.returns.len() >= self.config.max_call_depth {
                    return Err(FaultKind::CallDepthExceeded {
                        limit: self.config.max_call_depth,
                    });
                }
                self.stack.pop();
                self.returns.push(inst.next_addr());
                self.ip = addr;
            }
            None => {
                if let Some(callee) = self.stack.last() {
                    log::debug!("call to undefined function {} ignored", callee);
                }
                let keep = self.stack.len() - argc - 1;
                self.stack.truncate(keep);
                self.stack.push(Value::Nil);
                self.ip = inst.next_addr();
            }
        }
        Ok(())
    }

    fn exec_sys(&mut self, inst: &Instruction, host: &mut dyn Host) -> Exec<()> {
        let spec = Syscall::by_id(inst.a).ok_or(FaultKind::UnknownSyscall(inst.a))?;
        let argc = inst.b as usize;
        if self.stack.len() < argc {
            return Err(FaultKind::StackUnderflow);
        }
        if argc == 0 && self.stack.len() >= self.config.max_stack {
            return Err(FaultKind::StackOverflow {
                limit: self.config.max_stack,
            });
        }

        let base = self.stack.len() - argc;
        let args = &self.stack[base..];
        if self.config.check_syscalls {
            check_args(spec, args)?;
        }

        let result = if argc >= spec.min_args {
            dispatch(spec.syscall, args, host)
        } else {
            log::debug!("{} called with {} arguments, skipped", spec.name, argc);
            default_result(spec.syscall)
        };

        self.stack.truncate(base);
        self.stack.push(result);
        Ok(())
    }

    fn arith(&mut self, op: &'static str, f: impl FnOnce(f64, f64) -> Exec<f64>) -> Exec<()> {
        let (a, b) = self.peek_pair()?;
        let x = a
            .as_number()
            .ok_or_else(|| type_mismatch(op, "numbers", a))?;
        let y = b
            .as_number()
            .ok_or_else(|| type_mismatch(op, "numbers", b))?;
        let r = f(x, y)?;
        self.replace(2, Value::Number(r));
        Ok(())
    }

    fn compare(&mut self, op: &'static str, test: fn(std::cmp::Ordering) -> bool) -> Exec<()> {
        let (a, b) = self.peek_pair()?;
        let comparable = matches!((a, b), (Value::Str(_), Value::Str(_)))
            || (a.as_number().is_some() && b.as_number().is_some());
        if !comparable {
            return Err(FaultKind::TypeMismatch {
                op,
                expected: "two numbers or two strings",
                got: format!("{} and {}", a.type_name(), b.type_name()),
            });
        }
        // NaN compares false both ways
        let r = a.compare(b).is_some_and(test);
        self.replace(2, Value::Bool(r));
        Ok(())
    }

    fn function_address(&self, name: &str) -> Option<usize> {
        match self.globals.get(name) {
            Some(Value::Number(n)) => self.address(*n),
            _ => None,
        }
    }

    /// Callee reference on the stack: an address, or a function name.
    fn resolve_callee(&self, callee: &Value) -> Option<usize> {
        match callee {
            Value::Number(n) => self.address(*n),
            Value::Str(name) => self.function_address(name),
            _ => None,
        }
    }

    /// `n` as the entry of a function declared by the loaded chunk.
    fn address(&self, n: f64) -> Option<usize> {
        let valid = n.fract() == 0.0 && n >= 0.0 && n < self.chunk.len() as f64;
        valid
            .then_some(n as usize)
            .filter(|&addr| self.chunk.is_function_entry(addr))
    }

    fn constant(&self, k: u32) -> Exec<&Value> {
        self.chunk
            .constants
            .get(k as usize)
            .ok_or(FaultKind::BadConstant(k))
    }

    fn name(&self, k: u32) -> Exec<&str> {
        match self.constant(k)? {
            Value::Str(s) => Ok(s),
            _ => Err(FaultKind::BadConstant(k)),
        }
    }

    // Stack

    fn push(&mut self, value: Value) -> Exec<()> {
        if self.stack.len() >= self.config.max_stack {
            return Err(FaultKind::StackOverflow {
                limit: self.config.max_stack,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Exec<Value> {
        self.stack.pop().ok_or(FaultKind::StackUnderflow)
    }

    fn peek(&self, depth: usize) -> Exec<&Value> {
        let len = self.stack.len();
        if depth < len {
            Ok(&self.stack[len - 1 - depth])
        } else {
            Err(FaultKind::StackUnderflow)
        }
    }

    /// `(second, top)`
    fn peek_pair(&self) -> Exec<(&Value, &Value)> {
        Ok((self.peek(1)?, self.peek(0)?))
    }

    /// Pops `n` values and pushes `value`; the caller has checked depth.
    fn replace(&mut self, n: usize, value: Value) {
        let keep = self.stack.len() - n;
        self.stack.truncate(keep);
        self.stack.push(value);
    }
}

fn type_mismatch(op: &'static str, expected: &'static str, got: &Value) -> FaultKind {
    FaultKind::TypeMismatch {
        op,
        expected,
        got: got.type_name().to_string(),
    }
}

/// Numbers show their value, so an out-of-range color reads as such.
fn describe(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        other => other.type_name().to_string(),
    }
}

fn check_args(spec: &SyscallSpec, args: &[Value]) -> Exec<()> {
    if !spec.accepts_arity(args.len()) {
        return Err(FaultKind::SyscallArity {
            name: spec.name,
            signature: spec.signature(),
            got: args.len(),
        });
    }
    for (index, (kind, value)) in spec.args.iter().zip(args).enumerate() {
        if !kind.accepts(value) {
            return Err(FaultKind::SyscallArgument {
                name: spec.name,
                index,
                expected: kind.name(),
                got: describe(value),
            });
        }
    }
    Ok(())
}

fn color(n: f64) -> u8 {
    n.floor().rem_euclid(PALETTE_SIZE as f64) as u8
}

fn button(n: f64) -> Option<u8> {
    (n.fract() == 0.0 && n >= 0.0 && n < BUTTON_COUNT as f64).then_some(n as u8)
}

fn default_result(syscall: Syscall) -> Value {
    match syscall {
        Syscall::Btn => Value::Bool(false),
        _ => Value::Number(0.0),
    }
}

fn dispatch(syscall: Syscall, args: &[Value], host: &mut dyn Host) -> Value {
    let num = |i: usize| args.get(i).map_or(0.0, Value::to_number_lossy);
    let text = |i: usize| args.get(i).map(Value::to_string).unwrap_or_default();

    match syscall {
        Syscall::Pset => host.pset(num(0), num(1), color(num(2))),
        Syscall::Sfx => host.sfx(num(0)),
        Syscall::Spr => host.spr(num(0), num(1), num(2)),
        Syscall::Btn => {
            let pressed = button(num(0)).is_some_and(|b| host.btn(b));
            return Value::Bool(pressed);
        }
        Syscall::Cls => host.cls(),
        Syscall::Print => {
            let small = args.get(4).is_some_and(Value::is_truthy);
            host.print(&text(0), num(1), num(2), color(num(3)), small);
        }
        Syscall::Log => host.log(&text(0)),
    }
    default_result(syscall)
}
