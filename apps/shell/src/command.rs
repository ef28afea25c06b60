pub struct Command<'a> {
    pub name: &'a str,
    rest: &'a str,
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Option<Command<'a>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        Some(Command {
            name,
            rest: rest.trim_start(),
        })
    }

    pub fn args(&self) -> core::str::SplitWhitespace<'a> {
        self.rest.split_whitespace()
    }

    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args().nth(index)
    }

    /// Everything after the command name, spacing preserved.
    pub fn text(&self) -> &'a str {
        self.rest
    }
}

/// Decimal, or hexadecimal with a `0x` prefix.
pub fn parse_number(text: &str) -> Option<usize> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
