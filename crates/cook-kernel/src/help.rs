//! Help text generation for the CLI.

use std::fmt::Write;

use crate::functions::{Function, Registry};

/// Top-level usage text, with the built-in function catalog.
pub fn general(registry: &Registry) -> String {
    let mut out = String::from(
        "cook — interpreter for Cookfile build and task scripts\n\
         \n\
         Usage:\n\
         \x20 cook [flags] [TARGET ...]      run targets from a Cookfile (default: all)\n\
         \x20 cook @FUNC [args ...]          invoke a built-in function directly\n\
         \x20 cook help [@FUNC]              print this help, or a function's help\n\
         \n\
         Flags:\n\
         \x20 -c PATH                        Cookfile to interpret (default: Cookfile)\n\
         \x20 --name VALUE                   define variable `name` (auto-detected type)\n\
         \x20 --name=VALUE                   same, inline form\n\
         \x20 --name:T VALUE                 typed variable; T is i, f, s, b or a\n\
         \x20 --name:K:V KEY:VALUE           map variable entry; repeat to accumulate\n\
         \n\
         Functions:\n",
    );
    for f in registry.functions() {
        let mut name = f.name().to_string();
        for alias in f.aliases() {
            name.push_str(", ");
            name.push_str(alias);
        }
        let _ = writeln!(out, "  @{name:<18} {}", f.summary());
    }
    out
}

/// Usage text for one function.
pub fn function(f: &dyn Function) -> String {
    let mut out = String::new();
    let _ = write!(out, "Usage of @{}", f.name());
    for alias in f.aliases() {
        let _ = write!(out, " (alias @{alias})");
    }
    let _ = writeln!(out, ":\n  {}", f.summary());
    let flags = f.flags();
    if !flags.is_empty() {
        let _ = writeln!(out, "\nFlags:");
        for flag in flags {
            let names = match flag.short {
                Some(s) => format!("-{s}, --{}", flag.long),
                None => format!("--{}", flag.long),
            };
            let _ = writeln!(out, "  {names:<18} {}", flag.desc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_help_lists_functions() {
        let registry = Registry::with_builtins();
        let text = general(&registry);
        assert!(text.contains("@print"));
        assert!(text.contains("@mkdir"));
        assert!(text.contains("-c PATH"));
    }

    #[test]
    fn function_help_shows_flags_and_aliases() {
        let registry = Registry::with_builtins();
        let print = registry.get("print").unwrap();
        let text = function(print.as_ref());
        assert!(text.contains("Usage of @print"));
        assert!(text.contains("alias @echo"));
        assert!(text.contains("--no-newline"));
    }
}
