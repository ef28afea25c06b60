/// Something that can display one character at a time: a text console,
/// a serial port, a framebuffer font renderer.
pub trait CharSink: Send + Sync {
    fn put_char(&self, c: char);

    fn put_str(&self, s: &str) {
        for c in s.chars() {
            self.put_char(c);
        }
    }
}

/// Blocking character input, typically a keyboard driver.
/// Returns `None` once the source is exhausted and will never produce more.
pub trait CharSource {
    fn read_char(&mut self) -> Option<char>;
}
