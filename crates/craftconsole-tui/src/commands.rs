use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiCommand {
    List(Option<String>),
    Cd(CdTarget),
    Cat(String),
    Save(Option<String>),
    Close,
    Rm(String),
    Mv(String, String),
    Mkdir(String),
    Touch(String),
    Get(String),
    Put(Vec<PathBuf>),
    Insights,
    Files,
    Help,
    Quit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CdTarget {
    Up,
    Root,
    Segment(usize),
    Folder(String),
}

pub const HELP: &[&str] = &[
    ":files                toggle the file manager",
    ":ls [dir]             list the current directory or a child folder",
    ":cd <dir|..|/|#n>     change directory (#n jumps to breadcrumb n)",
    ":cat <file>           open a file",
    ":save [text]          save the open file (\\n in text is a newline)",
    ":close                close the open file",
    ":rm <name>  :mv <old> <new>  :mkdir <name>  :touch <name>",
    ":get <file>           download into the downloads directory",
    ":put <paths...>       upload local files into the current directory",
    ":insights             toggle the metrics bar",
    ":quit                 leave",
];

pub fn parse(input: &str) -> Result<UiCommand, String> {
    let body = input.strip_prefix(':').unwrap_or(input).trim_start();
    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    let arg = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!(":{name} needs {what}"))
        } else {
            Ok(rest.to_string())
        }
    };

    match name {
        "ls" => Ok(UiCommand::List((!rest.is_empty()).then(|| rest.to_string()))),
        "cd" => {
            let target = match rest {
                "" | "/" | "~" => CdTarget::Root,
                ".." => CdTarget::Up,
                other => match other.strip_prefix('#').map(str::parse::<usize>) {
                    Some(Ok(n)) => CdTarget::Segment(n),
                    Some(Err(_)) => return Err(format!("bad breadcrumb index {other}")),
                    None => CdTarget::Folder(other.to_string()),
                },
            };
            Ok(UiCommand::Cd(target))
        }
        "cat" | "open" => arg("a file name").map(UiCommand::Cat),
        "save" | "w" => Ok(UiCommand::Save(
            (!rest.is_empty()).then(|| rest.replace("\\n", "\n")),
        )),
        "close" => Ok(UiCommand::Close),
        "rm" => arg("a name").map(UiCommand::Rm),
        "mv" => {
            let mut parts = rest.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(old), Some(new), None) => Ok(UiCommand::Mv(old.to_string(), new.to_string())),
                _ => Err(":mv needs <old> <new>".to_string()),
            }
        }
        "mkdir" => arg("a folder name").map(UiCommand::Mkdir),
        "touch" => arg("a file name").map(UiCommand::Touch),
        "get" => arg("a file name").map(UiCommand::Get),
        "put" => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                Err(":put needs at least one local path".to_string())
            } else {
                Ok(UiCommand::Put(paths))
            }
        }
        "insights" => Ok(UiCommand::Insights),
        "files" => Ok(UiCommand::Files),
        "help" | "h" => Ok(UiCommand::Help),
        "quit" | "q" => Ok(UiCommand::Quit),
        other => Err(format!("unknown command :{other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigation() {
        assert_eq!(parse(":cd ..").unwrap(), UiCommand::Cd(CdTarget::Up));
        assert_eq!(parse(":cd").unwrap(), UiCommand::Cd(CdTarget::Root));
        assert_eq!(parse(":cd #2").unwrap(), UiCommand::Cd(CdTarget::Segment(2)));
        assert_eq!(
            parse(":cd plugins").unwrap(),
            UiCommand::Cd(CdTarget::Folder("plugins".to_string()))
        );
        assert!(parse(":cd #x").is_err());
        assert_eq!(parse(":ls").unwrap(), UiCommand::List(None));
    }

    #[test]
    fn parses_file_operations() {
        assert_eq!(
            parse(":mv a.yml b.yml").unwrap(),
            UiCommand::Mv("a.yml".to_string(), "b.yml".to_string())
        );
        assert!(parse(":mv a.yml").is_err());
        assert_eq!(
            parse(":save motd=hi\\nmax-players=20").unwrap(),
            UiCommand::Save(Some("motd=hi\nmax-players=20".to_string()))
        );
        assert_eq!(parse(":save").unwrap(), UiCommand::Save(None));
        assert_eq!(
            parse(":put a.txt  b.png").unwrap(),
            UiCommand::Put(vec![PathBuf::from("a.txt"), PathBuf::from("b.png")])
        );
        assert!(parse(":rm").is_err());
    }

    #[test]
    fn rejects_unknown_commands() {
        assert_eq!(parse(":frobnicate").unwrap_err(), "unknown command :frobnicate");
    }
}
