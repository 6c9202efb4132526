//! Filesystem built-ins.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cook_types::{Kind, Reader, Value};
use tracing::debug;

use crate::error::ErrorKind;

use super::{FlagSpec, Function, FunctionArgs, Registry};

pub(super) fn register(r: &mut Registry) {
    r.register(Rc::new(Mkdir));
    r.register(Rc::new(Rmdir));
    r.register(Rc::new(Rm));
    r.register(Rc::new(Mv));
    r.register(Rc::new(Cp));
    r.register(Rc::new(Chmod));
    r.register(Rc::new(Chown));
    r.register(Rc::new(Workin));
    r.register(Rc::new(Exists));
    r.register(Rc::new(ReadFile));
}

fn io_err(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> ErrorKind {
    let context = context.into();
    move |e| ErrorKind::io(context, e)
}

const RECURSIVE: &[FlagSpec] = &[FlagSpec::new(
    Some("r"),
    "recursive",
    Kind::Bool,
    "apply to directories recursively",
)];

const PARENTS: &[FlagSpec] = &[FlagSpec::new(
    Some("p"),
    "parents",
    Kind::Bool,
    "create missing parent directories",
)];

struct Mkdir;

impl Function for Mkdir {
    fn name(&self) -> &'static str {
        "mkdir"
    }

    fn summary(&self) -> &'static str {
        "Create directories"
    }

    fn flags(&self) -> &'static [FlagSpec] {
        PARENTS
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        args.require(1, "@mkdir [-p] DIR ...")?;
        for dir in args.strings()? {
            debug!(dir = %dir, "mkdir");
            if args.has_flag("parents") {
                fs::create_dir_all(&dir).map_err(io_err(format!("mkdir {dir}")))?;
            } else {
                fs::create_dir(&dir).map_err(io_err(format!("mkdir {dir}")))?;
            }
        }
        Ok(Value::Nil)
    }
}

struct Rmdir;

impl Function for Rmdir {
    fn name(&self) -> &'static str {
        "rmdir"
    }

    fn summary(&self) -> &'static str {
        "Remove empty directories"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        args.require(1, "@rmdir DIR ...")?;
        for dir in args.strings()? {
            fs::remove_dir(&dir).map_err(io_err(format!("rmdir {dir}")))?;
        }
        Ok(Value::Nil)
    }
}

struct Rm;

impl Function for Rm {
    fn name(&self) -> &'static str {
        "rm"
    }

    fn summary(&self) -> &'static str {
        "Remove files, and directories with -r"
    }

    fn flags(&self) -> &'static [FlagSpec] {
        RECURSIVE
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        args.require(1, "@rm [-r] PATH ...")?;
        for path in args.strings()? {
            let p = Path::new(&path);
            if p.is_dir() {
                if !args.has_flag("recursive") {
                    return Err(ErrorKind::Argument(format!(
                        "{path} is a directory, use -r to remove it"
                    )));
                }
                fs::remove_dir_all(p).map_err(io_err(format!("rm {path}")))?;
            } else {
                fs::remove_file(p).map_err(io_err(format!("rm {path}")))?;
            }
        }
        Ok(Value::Nil)
    }
}

struct Mv;

impl Function for Mv {
    fn name(&self) -> &'static str {
        "mv"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["move"]
    }

    fn summary(&self) -> &'static str {
        "Move or rename files and directories"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        args.require(2, "@mv SOURCE ... DEST")?;
        let paths = args.strings()?;
        let (dest, sources) = paths.split_last().expect("checked above");
        let dest_is_dir = Path::new(dest).is_dir();
        if sources.len() > 1 && !dest_is_dir {
            return Err(ErrorKind::Argument(format!(
                "moving multiple sources requires {dest} to be a directory"
            )));
        }
        for src in sources {
            let target = if dest_is_dir {
                let name = Path::new(src)
                    .file_name()
                    .ok_or_else(|| ErrorKind::BadPath(src.clone()))?;
                Path::new(dest).join(name)
            } else {
                Path::new(dest).to_path_buf()
            };
            fs::rename(src, &target).map_err(io_err(format!("mv {src}")))?;
        }
        Ok(Value::Nil)
    }
}

struct Cp;

impl Function for Cp {
    fn name(&self) -> &'static str {
        "cp"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["copy"]
    }

    fn summary(&self) -> &'static str {
        "Copy files, and directories with -r"
    }

    fn flags(&self) -> &'static [FlagSpec] {
        RECURSIVE
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        args.require(2, "@cp [-r] SOURCE ... DEST")?;
        let paths = args.strings()?;
        let (dest, sources) = paths.split_last().expect("checked above");
        let dest_is_dir = Path::new(dest).is_dir();
        if sources.len() > 1 && !dest_is_dir {
            return Err(ErrorKind::Argument(format!(
                "copying multiple sources requires {dest} to be a directory"
            )));
        }
        for src in sources {
            let sp = Path::new(src);
            let target = if dest_is_dir {
                let name = sp
                    .file_name()
                    .ok_or_else(|| ErrorKind::BadPath(src.clone()))?;
                Path::new(dest).join(name)
            } else {
                Path::new(dest).to_path_buf()
            };
            if sp.is_dir() {
                if !args.has_flag("recursive") {
                    return Err(ErrorKind::Argument(format!(
                        "{src} is a directory, use -r to copy it"
                    )));
                }
                copy_tree(sp, &target)?;
            } else {
                fs::copy(sp, &target).map_err(io_err(format!("cp {src}")))?;
            }
        }
        Ok(Value::Nil)
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<(), ErrorKind> {
    fs::create_dir_all(dest).map_err(io_err(format!("cp {}", dest.display())))?;
    let entries = fs::read_dir(src).map_err(io_err(format!("cp {}", src.display())))?;
    for entry in entries {
        let entry = entry.map_err(io_err(format!("cp {}", src.display())))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(io_err(format!("cp {}", from.display())))?;
        }
    }
    Ok(())
}

const RECURSIVE_TREE: &[FlagSpec] = &[FlagSpec::new(
    Some("R"),
    "recursive",
    Kind::Bool,
    "apply to directory trees recursively",
)];

/// Collect a path and, below a directory, everything underneath it.
fn walk_tree(path: &Path, out: &mut Vec<PathBuf>) -> Result<(), ErrorKind> {
    out.push(path.to_path_buf());
    if path.is_dir() {
        let entries =
            fs::read_dir(path).map_err(io_err(format!("read {}", path.display())))?;
        for entry in entries {
            let entry = entry.map_err(io_err(format!("read {}", path.display())))?;
            walk_tree(&entry.path(), out)?;
        }
    }
    Ok(())
}

/// Parse a chmod mode specification against the current permission bits.
///
/// Accepts octal forms (`0755`, `644`) and symbolic clauses
/// (`u+x`, `go-w`, `a=rw`, `u+r-w`, comma separated). `X` grants execute
/// only on directories or files that already carry an execute bit; `s`
/// sets the setuid/setgid bit for the named who-class.
fn parse_mode(current: u32, spec: &str, is_dir: bool) -> Result<u32, ErrorKind> {
    let bad = |msg: &str| ErrorKind::Argument(format!("invalid mode {spec}: {msg}"));
    if spec.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return u32::from_str_radix(spec, 8).map_err(|_| bad("not an octal number"));
    }
    let mut mode = current & 0o7777;
    for clause in spec.split(',') {
        let chars: Vec<char> = clause.chars().collect();
        let mut i = 0;
        let mut who = 0u32;
        while i < chars.len() {
            who |= match chars[i] {
                'u' => 0o700,
                'g' => 0o070,
                'o' => 0o007,
                'a' => 0o777,
                _ => break,
            };
            i += 1;
        }
        if who == 0 {
            who = 0o777;
        }
        if i >= chars.len() {
            return Err(bad("missing operator +, - or ="));
        }
        while i < chars.len() {
            let op = chars[i];
            if !matches!(op, '+' | '-' | '=') {
                return Err(bad("missing operator +, - or ="));
            }
            i += 1;
            let mut perm = 0u32;
            let mut special = 0u32;
            while i < chars.len() && !matches!(chars[i], '+' | '-' | '=') {
                match chars[i] {
                    'r' => perm |= 0o444,
                    'w' => perm |= 0o222,
                    'x' => perm |= 0o111,
                    'X' => {
                        if is_dir || current & 0o111 != 0 {
                            perm |= 0o111;
                        }
                    }
                    's' => {
                        if who & 0o700 != 0 {
                            special |= 0o4000;
                        }
                        if who & 0o070 != 0 {
                            special |= 0o2000;
                        }
                    }
                    other => return Err(bad(&format!("unknown permission {other}"))),
                }
                i += 1;
            }
            let bits = perm & who;
            match op {
                '+' => mode |= bits | special,
                '-' => mode &= !(bits | special),
                '=' => mode = (mode & !who) | bits | special,
                _ => unreachable!(),
            }
        }
    }
    Ok(mode)
}

/// Change file permission bits: `@chmod [-R] MODE PATH …`.
struct Chmod;

impl Function for Chmod {
    fn name(&self) -> &'static str {
        "chmod"
    }

    fn summary(&self) -> &'static str {
        "Change file modes, octal or symbolic"
    }

    fn flags(&self) -> &'static [FlagSpec] {
        RECURSIVE_TREE
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        args.require(2, "@chmod [-R] MODE PATH ...")?;
        let all = args.strings()?;
        let (spec, roots) = all.split_first().expect("checked above");
        let mut paths = Vec::new();
        for root in roots {
            if args.has_flag("recursive") {
                walk_tree(Path::new(root), &mut paths)?;
            } else {
                paths.push(PathBuf::from(root));
            }
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            for path in paths {
                let meta = fs::metadata(&path)
                    .map_err(io_err(format!("chmod {}", path.display())))?;
                let mode = parse_mode(meta.permissions().mode(), spec, meta.is_dir())?;
                debug!(path = %path.display(), mode = %format!("{mode:o}"), "chmod");
                fs::set_permissions(&path, fs::Permissions::from_mode(mode))
                    .map_err(io_err(format!("chmod {}", path.display())))?;
            }
            Ok(Value::Nil)
        }
        #[cfg(not(unix))]
        {
            let _ = (spec, paths);
            Err(ErrorKind::Argument(
                "chmod is not supported on this platform".into(),
            ))
        }
    }
}

/// Change file ownership: `@chown [-R] OWNER[:GROUP] PATH …` with numeric
/// user and group ids.
struct Chown;

const CHOWN_FLAGS: &[FlagSpec] = &[
    FlagSpec::new(
        Some("R"),
        "recursive",
        Kind::Bool,
        "apply to directory trees recursively",
    ),
    FlagSpec::new(
        Some("n"),
        "numeric",
        Kind::Bool,
        "owner and group are numeric ids (always the case here)",
    ),
];

/// `uid`, `uid:gid` or `:gid`, numeric only.
fn parse_owner_group(spec: &str) -> Result<(Option<u32>, Option<u32>), ErrorKind> {
    let bad = || {
        ErrorKind::Argument(format!(
            "invalid owner {spec}: owner and group must be numeric ids"
        ))
    };
    let parse = |part: &str| -> Result<Option<u32>, ErrorKind> {
        if part.is_empty() {
            return Ok(None);
        }
        part.parse::<u32>().map(Some).map_err(|_| bad())
    };
    match spec.split_once(':') {
        Some((owner, group)) => Ok((parse(owner)?, parse(group)?)),
        None => Ok((parse(spec)?, None)),
    }
}

impl Function for Chown {
    fn name(&self) -> &'static str {
        "chown"
    }

    fn summary(&self) -> &'static str {
        "Change file ownership by numeric id"
    }

    fn flags(&self) -> &'static [FlagSpec] {
        CHOWN_FLAGS
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        args.require(2, "@chown [-R] OWNER[:GROUP] PATH ...")?;
        let all = args.strings()?;
        let (spec, roots) = all.split_first().expect("checked above");
        let (uid, gid) = parse_owner_group(spec)?;
        let mut paths = Vec::new();
        for root in roots {
            if args.has_flag("recursive") {
                walk_tree(Path::new(root), &mut paths)?;
            } else {
                paths.push(PathBuf::from(root));
            }
        }
        #[cfg(unix)]
        {
            for path in paths {
                debug!(path = %path.display(), ?uid, ?gid, "chown");
                std::os::unix::fs::chown(&path, uid, gid)
                    .map_err(io_err(format!("chown {}", path.display())))?;
            }
            Ok(Value::Nil)
        }
        #[cfg(not(unix))]
        {
            let _ = (uid, gid, paths);
            Err(ErrorKind::Argument(
                "chown is not supported on this platform".into(),
            ))
        }
    }
}

/// Change the working directory. The directory is target-scoped: the
/// target runner restores the previous directory when the target returns.
struct Workin;

impl Function for Workin {
    fn name(&self) -> &'static str {
        "workin"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["chdir"]
    }

    fn summary(&self) -> &'static str {
        "Change the working directory for the rest of the target"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let dir = args.string_at(0, "DIR")?;
        debug!(dir = %dir, "workin");
        std::env::set_current_dir(&dir).map_err(io_err(format!("workin {dir}")))?;
        Ok(Value::Nil)
    }
}

struct Exists;

impl Function for Exists {
    fn name(&self) -> &'static str {
        "exists"
    }

    fn summary(&self) -> &'static str {
        "Whether a path exists"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let path = args.string_at(0, "PATH")?;
        Ok(Value::Bool(Path::new(&path).exists()))
    }
}

/// Whole-file read as a reader value.
struct ReadFile;

impl Function for ReadFile {
    fn name(&self) -> &'static str {
        "readfile"
    }

    fn summary(&self) -> &'static str {
        "Open a file as a reader"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let path = args.string_at(0, "PATH")?;
        let f = fs::File::open(&path).map_err(io_err(format!("readfile {path}")))?;
        Ok(Value::Reader(Reader::new(Box::new(f))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Function;

    #[test]
    fn mkdir_and_exists_and_rmdir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a/b");
        let dir_s = dir.display().to_string();

        // without -p the parent is missing
        assert!(Mkdir.call(vec![Value::from(dir_s.as_str())]).is_err());
        Mkdir
            .call(vec![Value::from("-p"), Value::from(dir_s.as_str())])
            .unwrap();
        assert_eq!(
            Exists.call(vec![Value::from(dir_s.as_str())]).unwrap(),
            Value::Bool(true)
        );
        Rmdir.call(vec![Value::from(dir_s.as_str())]).unwrap();
        assert_eq!(
            Exists.call(vec![Value::from(dir_s.as_str())]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn rm_refuses_directories_without_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("d");
        std::fs::create_dir(&dir).unwrap();
        let dir_s = dir.display().to_string();
        assert!(Rm.call(vec![Value::from(dir_s.as_str())]).is_err());
        Rm.call(vec![Value::from("-r"), Value::from(dir_s.as_str())])
            .unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn cp_copies_file_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src.txt");
        let dst = tmp.path().join("dst.txt");
        std::fs::write(&src, "payload").unwrap();
        Cp.call(vec![
            Value::from(src.display().to_string()),
            Value::from(dst.display().to_string()),
        ])
        .unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "payload");
    }

    #[test]
    fn mv_renames() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.txt");
        let dst = tmp.path().join("b.txt");
        std::fs::write(&src, "x").unwrap();
        Mv.call(vec![
            Value::from(src.display().to_string()),
            Value::from(dst.display().to_string()),
        ])
        .unwrap();
        assert!(!src.exists());
        assert!(dst.exists());
    }

    #[test]
    fn mode_parsing_octal_and_symbolic() {
        assert_eq!(parse_mode(0o644, "0755", false).unwrap(), 0o755);
        assert_eq!(parse_mode(0o644, "755", false).unwrap(), 0o755);
        assert_eq!(parse_mode(0o644, "u+x", false).unwrap(), 0o744);
        assert_eq!(parse_mode(0o666, "go-w", false).unwrap(), 0o644);
        assert_eq!(parse_mode(0o777, "a=rw", false).unwrap(), 0o666);
        assert_eq!(parse_mode(0o600, "u+r-w", false).unwrap(), 0o400);
        assert_eq!(parse_mode(0o640, "u+x,o+r", false).unwrap(), 0o744);
        assert_eq!(parse_mode(0o644, "u+s", false).unwrap(), 0o4644);
    }

    #[test]
    fn mode_capital_x_depends_on_context() {
        // no execute bit anywhere on a plain file: X grants nothing
        assert_eq!(parse_mode(0o644, "a+X", false).unwrap(), 0o644);
        // directories always take it
        assert_eq!(parse_mode(0o644, "a+X", true).unwrap(), 0o755);
        // files with an existing execute bit take it too
        assert_eq!(parse_mode(0o744, "a+X", false).unwrap(), 0o755);
    }

    #[test]
    fn mode_parsing_rejects_garbage() {
        assert!(parse_mode(0o644, "u", false).is_err());
        assert!(parse_mode(0o644, "uq+x", false).is_err());
        assert!(parse_mode(0o644, "u+z", false).is_err());
        assert!(parse_mode(0o644, "9999999999", false).is_err());
    }

    #[test]
    fn owner_group_forms() {
        assert_eq!(parse_owner_group("1000").unwrap(), (Some(1000), None));
        assert_eq!(
            parse_owner_group("1000:100").unwrap(),
            (Some(1000), Some(100))
        );
        assert_eq!(parse_owner_group(":100").unwrap(), (None, Some(100)));
        assert!(parse_owner_group("alice").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn chmod_applies_symbolic_modes() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("m.txt");
        std::fs::write(&f, "x").unwrap();
        std::fs::set_permissions(&f, std::fs::Permissions::from_mode(0o644)).unwrap();
        Chmod
            .call(vec![
                Value::from("u+x"),
                Value::from(f.display().to_string()),
            ])
            .unwrap();
        let mode = std::fs::metadata(&f).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o744);
    }

    #[cfg(unix)]
    #[test]
    fn chmod_recursive_walks_the_tree() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("d");
        let inner = dir.join("f.txt");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(&inner, "x").unwrap();
        std::fs::set_permissions(&inner, std::fs::Permissions::from_mode(0o600)).unwrap();
        Chmod
            .call(vec![
                Value::from("-R"),
                Value::from("a+r"),
                Value::from(dir.display().to_string()),
            ])
            .unwrap();
        let mode = std::fs::metadata(&inner).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn readfile_returns_a_reader() {
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("r.txt");
        std::fs::write(&f, "stream me").unwrap();
        let v = ReadFile
            .call(vec![Value::from(f.display().to_string())])
            .unwrap();
        match v {
            Value::Reader(r) => assert_eq!(r.read_to_string().unwrap(), "stream me"),
            other => panic!("expected reader, got {other:?}"),
        }
    }
}
