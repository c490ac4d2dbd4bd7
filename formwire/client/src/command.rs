use formwire_client_runtime::{WidgetKind, WidgetValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set {
        window: String,
        path: String,
        kind: WidgetKind,
        value: WidgetValue,
    },
    Event {
        window: String,
        widget: String,
        event: String,
    },
    Show,
    Quit,
}

pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let command = match verb {
        "show" => Command::Show,
        "quit" | "exit" => Command::Quit,
        "event" => {
            let [window, widget, event] = words::<3>(rest)?;
            Command::Event { window, widget, event }
        }
        "set" => {
            let mut parts = rest.trim_start().splitn(4, char::is_whitespace);
            let (Some(window), Some(path), Some(kind)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err("usage: set <window> <path> <kind> <value>".to_string());
            };
            let kind = WidgetKind::from_name(kind).ok_or_else(|| format!("unknown widget kind `{kind}`"))?;
            let value = widget_value(kind, parts.next().unwrap_or(""))?;
            Command::Set {
                window: window.to_string(),
                path: path.to_string(),
                kind,
                value,
            }
        }
        other => return Err(format!("unknown command `{other}`")),
    };
    Ok(Some(command))
}

fn words<const N: usize>(text: &str) -> Result<[String; N], String> {
    let parts: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    parts
        .try_into()
        .map_err(|parts: Vec<String>| format!("expected {N} arguments, got {}", parts.len()))
}

fn widget_value(kind: WidgetKind, raw: &str) -> Result<WidgetValue, String> {
    let value = match kind {
        WidgetKind::NumberEntry => WidgetValue::Number(raw.trim().to_string()),
        WidgetKind::ToggleButton | WidgetKind::CheckButton | WidgetKind::RadioButton => {
            WidgetValue::Active(parse_flag(raw)?)
        }
        WidgetKind::Notebook | WidgetKind::ProgressBar => WidgetValue::Integer(
            raw.trim()
                .parse()
                .map_err(|_| format!("`{raw}` is not an integer"))?,
        ),
        WidgetKind::List | WidgetKind::CList => WidgetValue::Selection(
            raw.split(',')
                .filter(|flag| !flag.trim().is_empty())
                .map(parse_flag)
                .collect::<Result<_, _>>()?,
        ),
        WidgetKind::Calendar => {
            let mut parts = raw.trim().splitn(3, '-').map(|part| part.parse::<i32>().ok());
            match (parts.next().flatten(), parts.next().flatten(), parts.next().flatten()) {
                (Some(year), Some(month), Some(day)) => WidgetValue::Date { year, month, day },
                _ => return Err(format!("`{raw}` is not a YYYY-MM-DD date")),
            }
        }
        _ => WidgetValue::Text(raw.to_string()),
    };
    Ok(value)
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim() {
        "T" | "t" | "true" | "1" | "on" => Ok(true),
        "F" | "f" | "false" | "0" | "off" => Ok(false),
        other => Err(format!("`{other}` is not a flag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_with_spaces_in_value() {
        let command = parse("set main main.name entry John Smith")
            .expect("parse")
            .expect("command");
        assert_eq!(
            command,
            Command::Set {
                window: "main".to_string(),
                path: "main.name".to_string(),
                kind: WidgetKind::Entry,
                value: WidgetValue::Text("John Smith".to_string()),
            }
        );
    }

    #[test]
    fn parses_typed_values() {
        let check = parse("set main main.ok check_button T").expect("parse");
        assert!(matches!(
            check,
            Some(Command::Set { value: WidgetValue::Active(true), .. })
        ));

        let list = parse("set main main.rows list T,F,T").expect("parse");
        assert!(matches!(
            list,
            Some(Command::Set { value: WidgetValue::Selection(ref flags), .. }) if flags == &[true, false, true]
        ));

        let date = parse("set main main.due calendar 2024-02-29").expect("parse");
        assert!(matches!(
            date,
            Some(Command::Set { value: WidgetValue::Date { year: 2024, month: 2, day: 29 }, .. })
        ));
    }

    #[test]
    fn parses_event_and_simple_verbs() {
        assert_eq!(
            parse("event main main.ok CLICKED").expect("parse"),
            Some(Command::Event {
                window: "main".to_string(),
                widget: "main.ok".to_string(),
                event: "CLICKED".to_string(),
            })
        );
        assert_eq!(parse("show").expect("parse"), Some(Command::Show));
        assert_eq!(parse("quit").expect("parse"), Some(Command::Quit));
        assert_eq!(parse("   ").expect("parse"), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse("event main").is_err());
        assert!(parse("set main main.x slider 3").is_err());
        assert!(parse("set main main.p progress_bar lots").is_err());
        assert!(parse("dance").is_err());
    }
}
