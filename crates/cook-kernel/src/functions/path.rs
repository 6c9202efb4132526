//! Path manipulation built-ins. All operations are lexical except `pabs`,
//! which resolves against the current working directory.

use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use cook_types::Value;

use crate::error::ErrorKind;

use super::{Function, FunctionArgs, Registry};

pub(super) fn register(r: &mut Registry) {
    r.register(Rc::new(Pabs));
    r.register(Rc::new(Pbase));
    r.register(Rc::new(Pext));
    r.register(Rc::new(Pdir));
    r.register(Rc::new(Pclean));
    r.register(Rc::new(Psplit));
    r.register(Rc::new(Pglob));
    r.register(Rc::new(Prel));
}

/// Lexical cleanup: collapse `.` and resolve `..` against preceding
/// components where possible.
fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

struct Pabs;

impl Function for Pabs {
    fn name(&self) -> &'static str {
        "pabs"
    }

    fn summary(&self) -> &'static str {
        "Absolute form of a path"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let p = args.string_at(0, "PATH")?;
        let path = Path::new(&p);
        let abs = if path.is_absolute() {
            clean(path)
        } else {
            let cwd = std::env::current_dir()
                .map_err(|e| ErrorKind::io("cannot read working directory", e))?;
            clean(&cwd.join(path))
        };
        Ok(Value::String(abs.display().to_string()))
    }
}

struct Pbase;

impl Function for Pbase {
    fn name(&self) -> &'static str {
        "pbase"
    }

    fn summary(&self) -> &'static str {
        "Last element of a path"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let p = args.string_at(0, "PATH")?;
        let base = Path::new(&p)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.clone());
        Ok(Value::String(base))
    }
}

struct Pext;

impl Function for Pext {
    fn name(&self) -> &'static str {
        "pext"
    }

    fn summary(&self) -> &'static str {
        "File extension of a path, including the dot"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let p = args.string_at(0, "PATH")?;
        let ext = Path::new(&p)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Ok(Value::String(ext))
    }
}

struct Pdir;

impl Function for Pdir {
    fn name(&self) -> &'static str {
        "pdir"
    }

    fn summary(&self) -> &'static str {
        "Directory portion of a path"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let p = args.string_at(0, "PATH")?;
        let dir = match Path::new(&p).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                parent.to_string_lossy().into_owned()
            }
            _ => ".".to_string(),
        };
        Ok(Value::String(dir))
    }
}

struct Pclean;

impl Function for Pclean {
    fn name(&self) -> &'static str {
        "pclean"
    }

    fn summary(&self) -> &'static str {
        "Lexically simplified form of a path"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let p = args.string_at(0, "PATH")?;
        Ok(Value::String(clean(Path::new(&p)).display().to_string()))
    }
}

struct Psplit;

impl Function for Psplit {
    fn name(&self) -> &'static str {
        "psplit"
    }

    fn summary(&self) -> &'static str {
        "Split a path into its components"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let p = args.string_at(0, "PATH")?;
        let parts: Vec<Value> = Path::new(&p)
            .components()
            .map(|c| Value::String(c.as_os_str().to_string_lossy().into_owned()))
            .collect();
        Ok(Value::List(parts))
    }
}

/// Whether a glob metacharacter appears in a pattern piece.
fn has_meta(s: &str) -> bool {
    s.chars().any(|c| matches!(c, '*' | '?' | '['))
}

/// Match one path segment against a pattern segment. `*` matches any run
/// of characters, `?` exactly one, `[a-z]` a class (negatable with `!` or
/// `^`). No separator ever matches, so patterns cross directories only
/// through their own `/`s.
fn segment_match(pat: &[char], name: &[char]) -> bool {
    match pat.first().copied() {
        None => name.is_empty(),
        Some('*') => (0..=name.len()).any(|k| segment_match(&pat[1..], &name[k..])),
        Some('?') => !name.is_empty() && segment_match(&pat[1..], &name[1..]),
        Some('[') => {
            let Some(&c) = name.first() else {
                return false;
            };
            let mut i = 1;
            let negate = matches!(pat.get(i).copied(), Some('!') | Some('^'));
            if negate {
                i += 1;
            }
            let mut matched = false;
            let mut first = true;
            loop {
                match pat.get(i).copied() {
                    None => return false, // unterminated class
                    Some(']') if !first => {
                        i += 1;
                        break;
                    }
                    Some(lo) => {
                        first = false;
                        if pat.get(i + 1).copied() == Some('-')
                            && !matches!(pat.get(i + 2).copied(), None | Some(']'))
                        {
                            let hi = pat[i + 2];
                            if lo <= c && c <= hi {
                                matched = true;
                            }
                            i += 3;
                        } else {
                            if lo == c {
                                matched = true;
                            }
                            i += 1;
                        }
                    }
                }
            }
            if matched == negate {
                return false;
            }
            segment_match(&pat[i..], &name[1..])
        }
        Some(c) => name.first() == Some(&c) && segment_match(&pat[1..], &name[1..]),
    }
}

/// Expand a glob pattern against the filesystem, segment by segment.
/// Matches come back sorted per directory; a pattern without
/// metacharacters yields itself when the path exists.
fn glob(pattern: &str) -> Result<Vec<String>, ErrorKind> {
    if !has_meta(pattern) {
        if Path::new(pattern).exists() {
            return Ok(vec![pattern.to_string()]);
        }
        return Ok(Vec::new());
    }
    let absolute = pattern.starts_with('/');
    let mut current = vec![PathBuf::from(if absolute { "/" } else { "" })];
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        let mut next = Vec::new();
        if !has_meta(segment) {
            for base in &current {
                let p = base.join(segment);
                if p.symlink_metadata().is_ok() {
                    next.push(p);
                }
            }
        } else {
            let pat: Vec<char> = segment.chars().collect();
            for base in &current {
                let dir = if base.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    base.as_path()
                };
                let Ok(entries) = std::fs::read_dir(dir) else {
                    continue;
                };
                let mut names: Vec<String> = entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                for name in names {
                    let chars: Vec<char> = name.chars().collect();
                    if segment_match(&pat, &chars) {
                        next.push(base.join(&name));
                    }
                }
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    Ok(current
        .into_iter()
        .map(|p| p.display().to_string())
        .collect())
}

struct Pglob;

impl Function for Pglob {
    fn name(&self) -> &'static str {
        "pglob"
    }

    fn summary(&self) -> &'static str {
        "Expand a glob pattern into matching paths"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let pattern = args.string_at(0, "PATTERN")?;
        let matches = glob(&pattern)?;
        Ok(Value::List(
            matches.into_iter().map(Value::String).collect(),
        ))
    }
}

struct Prel;

impl Function for Prel {
    fn name(&self) -> &'static str {
        "prel"
    }

    fn summary(&self) -> &'static str {
        "Path to a target relative to a base directory"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        args.require(2, "@prel BASE TARGET")?;
        let base = clean(Path::new(&args.string_at(0, "BASE")?));
        let target = clean(Path::new(&args.string_at(1, "TARGET")?));
        if base.is_absolute() != target.is_absolute() {
            return Err(ErrorKind::Argument(format!(
                "cannot make {} relative to {}",
                target.display(),
                base.display()
            )));
        }
        let mut b = base.components().peekable();
        let mut t = target.components().peekable();
        while let (Some(x), Some(y)) = (b.peek(), t.peek()) {
            if x == y {
                b.next();
                t.next();
            } else {
                break;
            }
        }
        let mut out = PathBuf::new();
        for _ in b {
            out.push("..");
        }
        for c in t {
            out.push(c);
        }
        if out.as_os_str().is_empty() {
            out.push(".");
        }
        Ok(Value::String(out.display().to_string()))
    }
}
