use system::io::{CharSink, CharSource};

const BACKSPACE: char = '\x08';
const DELETE: char = '\x7f';

/// Collects characters from a blocking source into a fixed buffer until
/// Enter, with backspace editing. A line holds at most `N - 1` bytes; once
/// full it is returned as if Enter had been pressed, and a character that
/// did not fit starts the next line.
pub struct LineReader<const N: usize> {
    buffer: [u8; N],
    len: usize,
    pending: Option<char>,
}

impl<const N: usize> LineReader<N> {
    pub const fn new() -> Self {
        LineReader {
            buffer: [0; N],
            len: 0,
            pending: None,
        }
    }

    /// Returns `None` when the source is exhausted before any character of
    /// a new line arrived. A partial line cut short by exhaustion is returned.
    pub fn read_line(
        &mut self,
        input: &mut dyn CharSource,
        echo: Option<&dyn CharSink>,
    ) -> Option<&str> {
        self.len = 0;
        let capacity = N.saturating_sub(1);

        while self.len < capacity {
            let Some(c) = self.pending.take().or_else(|| input.read_char()) else {
                if self.len == 0 {
                    return None;
                }
                break;
            };

            match c {
                '\n' => break,
                '\0' | '\r' => {}
                BACKSPACE | DELETE => {
                    if let Some(last) = self.line().chars().next_back() {
                        self.len -= last.len_utf8();
                        if let Some(echo) = echo {
                            echo.put_str("\x08 \x08");
                        }
                    }
                }
                c => {
                    let width = c.len_utf8();
                    if self.len + width > capacity {
                        // On an empty line it can never fit and is dropped.
                        if self.len > 0 {
                            self.pending = Some(c);
                        }
                        break;
                    }
                    c.encode_utf8(&mut self.buffer[self.len..self.len + width]);
                    self.len += width;
                    if let Some(echo) = echo {
                        echo.put_char(c);
                    }
                }
            }
        }

        Some(self.line())
    }

    fn line(&self) -> &str {
        // Only whole encoded chars are ever stored.
        core::str::from_utf8(&self.buffer[..self.len]).unwrap_or("")
    }
}

impl<const N: usize> Default for LineReader<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::string::String;
    use std::sync::Mutex;

    pub(crate) struct Script<'a>(pub(crate) core::str::Chars<'a>);

    impl CharSource for Script<'_> {
        fn read_char(&mut self) -> Option<char> {
            self.0.next()
        }
    }

    #[derive(Default)]
    pub(crate) struct Screen(pub(crate) Mutex<String>);

    impl Screen {
        pub(crate) fn text(&self) -> String {
            self.0.lock().unwrap().clone()
        }
    }

    impl CharSink for Screen {
        fn put_char(&self, c: char) {
            self.0.lock().unwrap().push(c);
        }
    }

    #[test]
    fn reads_lines_up_to_enter() {
        let mut input = Script("mem\nhelp\n".chars());
        let mut reader = LineReader::<64>::new();

        assert_eq!(reader.read_line(&mut input, None), Some("mem"));
        assert_eq!(reader.read_line(&mut input, None), Some("help"));
        assert_eq!(reader.read_line(&mut input, None), None);
    }

    #[test]
    fn empty_line_is_returned_as_empty() {
        let mut input = Script("\n".chars());
        let mut reader = LineReader::<64>::new();

        assert_eq!(reader.read_line(&mut input, None), Some(""));
    }

    #[test]
    fn exhausted_source_returns_partial_line() {
        let mut input = Script("echo hi".chars());
        let mut reader = LineReader::<64>::new();

        assert_eq!(reader.read_line(&mut input, None), Some("echo hi"));
        assert_eq!(reader.read_line(&mut input, None), None);
    }

    #[test]
    fn backspace_removes_last_character_and_erases_it() {
        let mut input = Script("memx\x08\n".chars());
        let screen = Screen::default();
        let mut reader = LineReader::<64>::new();

        assert_eq!(reader.read_line(&mut input, Some(&screen)), Some("mem"));
        assert_eq!(screen.text(), "memx\x08 \x08");
    }

    #[test]
    fn backspace_on_empty_line_does_nothing() {
        let mut input = Script("\x08\x7fab\n".chars());
        let screen = Screen::default();
        let mut reader = LineReader::<64>::new();

        assert_eq!(reader.read_line(&mut input, Some(&screen)), Some("ab"));
        assert_eq!(screen.text(), "ab");
    }

    #[test]
    fn nul_and_carriage_return_are_ignored() {
        let mut input = Script("a\0b\r\n".chars());
        let mut reader = LineReader::<64>::new();

        assert_eq!(reader.read_line(&mut input, None), Some("ab"));
    }

    #[test]
    fn full_buffer_ends_the_line() {
        let mut input = Script("abcdefgh\n".chars());
        let mut reader = LineReader::<5>::new();

        assert_eq!(reader.read_line(&mut input, None), Some("abcd"));
        assert_eq!(reader.read_line(&mut input, None), Some("efgh"));
    }

    #[test]
    fn multibyte_character_past_full_buffer_starts_next_line() {
        let mut input = Script("abcé\n".chars());
        let screen = Screen::default();
        let mut reader = LineReader::<5>::new();

        assert_eq!(reader.read_line(&mut input, Some(&screen)), Some("abc"));
        assert_eq!(reader.read_line(&mut input, Some(&screen)), Some("é"));
        assert_eq!(reader.read_line(&mut input, None), None);
        assert_eq!(screen.text(), "abcé");
    }

    #[test]
    fn character_wider_than_buffer_is_dropped() {
        let mut input = Script("é\nok\n".chars());
        let mut reader = LineReader::<2>::new();

        assert_eq!(reader.read_line(&mut input, None), Some(""));
        assert_eq!(reader.read_line(&mut input, None), Some(""));
        assert_eq!(reader.read_line(&mut input, None), Some("o"));
    }

    #[test]
    fn backspace_removes_whole_multibyte_character() {
        let mut input = Script("aé\x08\n".chars());
        let mut reader = LineReader::<16>::new();

        assert_eq!(reader.read_line(&mut input, None), Some("a"));
    }
}
