//! Chat template substitution.

/// Values for the six template tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct Placeholders<'a> {
    pub prefix: &'a str,
    pub suffix: &'a str,
    pub player: &'a str,
    pub display_name: &'a str,
    pub message: &'a str,
    pub world: &'a str,
}

impl<'a> Placeholders<'a> {
    fn lookup(&self, token: &str) -> Option<&'a str> {
        match token {
            "{prefix}" => Some(self.prefix),
            "{suffix}" => Some(self.suffix),
            "{player}" => Some(self.player),
            "{displayname}" => Some(self.display_name),
            "{message}" => Some(self.message),
            "{world}" => Some(self.world),
            _ => None,
        }
    }
}

/// Replaces the template tokens in one left-to-right scan.
///
/// Inserted values are never rescanned, so a message that contains
/// `{prefix}` stays literal. Unknown tokens are kept verbatim.
pub fn substitute(template: &str, values: &Placeholders<'_>) -> String {
    let mut out = String::with_capacity(template.len() + values.message.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];
        let replaced = candidate
            .find('}')
            .and_then(|close| Some((values.lookup(&candidate[..=close])?, close)));
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &candidate[close + 1..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_display_name_message() {
        let values = Placeholders {
            prefix: "[A] ",
            display_name: "Bob",
            message: "hi",
            ..Default::default()
        };
        assert_eq!(substitute("{prefix}{displayname}: {message}", &values), "[A] Bob: hi");
    }

    #[test]
    fn test_all_tokens_and_unknowns() {
        let values = Placeholders {
            prefix: "P",
            suffix: "S",
            player: "bob",
            display_name: "Bob",
            message: "M",
            world: "W",
        };
        assert_eq!(
            substitute("{prefix}{player}/{displayname}{suffix}@{world} {rank} {message}", &values),
            "Pbob/BobS@W {rank} M"
        );
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let values = Placeholders {
            player: "{message}",
            message: "{prefix} injected",
            prefix: "[P]",
            ..Default::default()
        };
        assert_eq!(
            substitute("{player}: {message}", &values),
            "{message}: {prefix} injected"
        );
    }

    #[test]
    fn test_unbalanced_braces() {
        let values = Placeholders {
            message: "x",
            ..Default::default()
        };
        assert_eq!(substitute("{{message}} {", &values), "{x} {");
    }
}
