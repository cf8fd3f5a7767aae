use std::collections::HashMap;
use std::sync::LazyLock;

use crate::lang::value::Value;

/// Number of palette entries a color index may address.
pub const PALETTE_SIZE: usize = 32;

/// Number of buttons `btn` can query: left, right, up, down, A, B.
pub const BUTTON_COUNT: usize = 6;

/// Host primitives reachable from bytecode through `SYS id argc`.
///
/// The numeric ids are part of the bytecode format. Id 3 is reserved for a
/// tile-map primitive the console does not expose yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syscall {
    Pset,
    Sfx,
    Spr,
    Btn,
    Cls,
    Print,
    Log,
}

/// Declared type of one syscall argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Number,
    Str,
    /// Integral palette index in `0..PALETTE_SIZE`.
    Color,
    /// Integral button id in `0..BUTTON_COUNT`.
    Button,
    Any,
}

impl ArgKind {
    pub fn name(self) -> &'static str {
        match self {
            ArgKind::Number => "number",
            ArgKind::Str => "string",
            ArgKind::Color => "color index",
            ArgKind::Button => "button id",
            ArgKind::Any => "any value",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ArgKind::Number => matches!(value, Value::Number(_)),
            ArgKind::Str => matches!(value, Value::Str(_)),
            ArgKind::Color => is_index_below(value, PALETTE_SIZE),
            ArgKind::Button => is_index_below(value, BUTTON_COUNT),
            ArgKind::Any => true,
        }
    }
}

fn is_index_below(value: &Value, limit: usize) -> bool {
    match value {
        Value::Number(n) => n.fract() == 0.0 && *n >= 0.0 && *n < limit as f64,
        _ => false,
    }
}

/// Name, id and signature of a syscall.
#[derive(Debug)]
pub struct SyscallSpec {
    pub syscall: Syscall,
    pub name: &'static str,
    pub id: u32,
    pub args: &'static [ArgKind],
    /// Trailing arguments past this count are optional.
    pub min_args: usize,
}

impl SyscallSpec {
    pub fn accepts_arity(&self, argc: usize) -> bool {
        argc >= self.min_args && argc <= self.args.len()
    }

    pub fn signature(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                if i >= self.min_args {
                    format!("[{}]", kind.name())
                } else {
                    kind.name().to_string()
                }
            })
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

use ArgKind::{Any, Button, Color, Number, Str};

pub static SYSCALLS: [SyscallSpec; 7] = [
    SyscallSpec {
        syscall: Syscall::Pset,
        name: "pset",
        id: 0,
        args: &[Number, Number, Color],
        min_args: 3,
    },
    SyscallSpec {
        syscall: Syscall::Sfx,
        name: "sfx",
        id: 1,
        args: &[Number],
        min_args: 1,
    },
    SyscallSpec {
        syscall: Syscall::Spr,
        name: "spr",
        id: 2,
        args: &[Number, Number, Number],
        min_args: 3,
    },
    SyscallSpec {
        syscall: Syscall::Btn,
        name: "btn",
        id: 4,
        args: &[Button],
        min_args: 1,
    },
    SyscallSpec {
        syscall: Syscall::Cls,
        name: "cls",
        id: 5,
        args: &[],
        min_args: 0,
    },
    SyscallSpec {
        syscall: Syscall::Print,
        name: "print",
        id: 6,
        args: &[Str, Number, Number, Color, Number],
        min_args: 4,
    },
    SyscallSpec {
        syscall: Syscall::Log,
        name: "log",
        id: 7,
        args: &[Any],
        min_args: 1,
    },
];

static BY_NAME: LazyLock<HashMap<&'static str, &'static SyscallSpec>> =
    LazyLock::new(|| SYSCALLS.iter().map(|spec| (spec.name, spec)).collect());

static BY_ID: LazyLock<HashMap<u32, &'static SyscallSpec>> =
    LazyLock::new(|| SYSCALLS.iter().map(|spec| (spec.id, spec)).collect());

impl Syscall {
    pub fn by_name(name: &str) -> Option<&'static SyscallSpec> {
        BY_NAME.get(name).copied()
    }

    pub fn by_id(id: u32) -> Option<&'static SyscallSpec> {
        BY_ID.get(&id).copied()
    }

    /// Table row of this syscall; rows are in declaration order.
    pub fn spec(self) -> &'static SyscallSpec {
        let row = match self {
            Syscall::Pset => 0,
            Syscall::Sfx => 1,
            Syscall::Spr => 2,
            Syscall::Btn => 3,
            Syscall::Cls => 4,
            Syscall::Print => 5,
            Syscall::Log => 6,
        };
        &SYSCALLS[row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_id_agree() {
        for spec in &SYSCALLS {
            let by_name = Syscall::by_name(spec.name).unwrap();
            let by_id = Syscall::by_id(spec.id).unwrap();
            assert_eq!(by_name.syscall, by_id.syscall);
            assert_eq!(spec.syscall.spec().name, spec.name);
        }
    }

    #[test]
    fn test_line_and_rect_are_not_syscalls() {
        assert!(Syscall::by_name("line").is_none());
        assert!(Syscall::by_name("rect").is_none());
        assert!(Syscall::by_id(3).is_none());
    }

    #[test]
    fn test_print_has_optional_small_flag() {
        let print = Syscall::by_name("print").unwrap();
        assert!(print.accepts_arity(4));
        assert!(print.accepts_arity(5));
        assert!(!print.accepts_arity(3));
        assert_eq!(
            print.signature(),
            "print(string, number, number, color index, [number])"
        );
    }

    #[test]
    fn test_arg_kinds() {
        assert!(ArgKind::Color.accepts(&Value::Number(31.0)));
        assert!(!ArgKind::Color.accepts(&Value::Number(32.0)));
        assert!(!ArgKind::Color.accepts(&Value::Number(1.5)));
        assert!(ArgKind::Button.accepts(&Value::Number(5.0)));
        assert!(!ArgKind::Button.accepts(&Value::Number(6.0)));
        assert!(!ArgKind::Number.accepts(&Value::Str("x".into())));
        assert!(ArgKind::Any.accepts(&Value::Nil));
    }
}
