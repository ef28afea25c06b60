pub struct ShellConfig {
    pub prompt: &'static str,
    pub banner: &'static str,
    /// Echo typed characters back to the output. Off when the terminal
    /// already does it.
    pub echo_input: bool,
}

impl ShellConfig {
    pub const DEFAULT: ShellConfig = ShellConfig {
        prompt: "> ",
        banner: "First-fit heap shell\nType 'help' for commands, 'mem' for memory stats.",
        echo_input: true,
    };
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
