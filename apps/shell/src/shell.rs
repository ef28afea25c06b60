use core::fmt::{self, Write};

use heap::{HeapPtr, LockedHeap};
use system::io::{CharSink, CharSource};

use crate::command::{parse_number, Command};
use crate::config::ShellConfig;
use crate::line_reader::LineReader;

pub const LINE_CAPACITY: usize = 256;

struct SinkWriter<'a> {
    sink: &'a dyn CharSink,
}

impl Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.sink.put_str(s);
        Ok(())
    }
}

/// Command interpreter over a heap. It only ever requests, releases and
/// queries memory through the heap's public operations.
pub struct Shell<'a, 'r> {
    heap: &'a LockedHeap<'r>,
    out: &'a dyn CharSink,
    config: &'a ShellConfig,
}

impl<'a, 'r> Shell<'a, 'r> {
    pub fn new(heap: &'a LockedHeap<'r>, out: &'a dyn CharSink, config: &'a ShellConfig) -> Self {
        Shell { heap, out, config }
    }

    /// Prints the banner, then reads and executes lines until the input is
    /// exhausted.
    pub fn run(&mut self, input: &mut dyn CharSource) {
        let mut reader = LineReader::<LINE_CAPACITY>::new();
        let echo = if self.config.echo_input {
            Some(self.out)
        } else {
            None
        };

        self.println(format_args!("{}", self.config.banner));
        loop {
            self.out.put_str(self.config.prompt);
            let Some(line) = reader.read_line(input, echo) else {
                break;
            };
            if self.config.echo_input {
                self.out.put_char('\n');
            }
            self.execute(line);
        }
    }

    pub fn execute(&mut self, line: &str) {
        let Some(command) = Command::parse(line) else {
            return;
        };

        match command.name {
            "help" => self.help(),
            "mem" => self.mem(),
            "test" => self.test(),
            "echo" => self.println(format_args!("{}", command.text())),
            "alloc" => self.alloc(&command),
            "free" => self.free(&command),
            "heap" => self.dump(),
            name => {
                self.println(format_args!("Unknown command: {}", name));
                self.println(format_args!("Type 'help' for available commands."));
            }
        }
    }

    fn println(&self, args: fmt::Arguments) {
        let mut writer = SinkWriter { sink: self.out };
        let _ = writer.write_fmt(args);
        self.out.put_char('\n');
    }

    fn help(&self) {
        self.println(format_args!("Available commands:"));
        self.println(format_args!("  help          - Show this help message"));
        self.println(format_args!("  mem           - Show memory statistics"));
        self.println(format_args!("  test          - Test memory allocation"));
        self.println(format_args!("  echo [text]   - Echo text back"));
        self.println(format_args!("  alloc <bytes> - Allocate a block"));
        self.println(format_args!("  free <offset> - Free a block"));
        self.println(format_args!("  heap          - Show the block chain"));
    }

    fn mem(&self) {
        let stats = self.heap.stats();
        self.println(format_args!("Memory Statistics:"));
        self.println(format_args!("  Total: {} bytes", stats.total));
        self.println(format_args!("  Used:  {} bytes", stats.used));
        self.println(format_args!("  Free:  {} bytes", stats.free));
        self.println(format_args!("  Blocks: {}", stats.blocks));
        self.println(format_args!("  Largest free: {} bytes", stats.largest_free));
    }

    fn test(&self) {
        self.println(format_args!("Testing memory allocation..."));

        let first = self.heap.allocate(100);
        let second = self.heap.allocate(200);
        let third = self.heap.allocate(50);

        if let (Some(first), Some(second), Some(third)) = (first, second, third) {
            self.println(format_args!("  Allocated 3 blocks successfully"));
            if !self.release(second) {
                return;
            }
            self.println(format_args!("  Freed middle block"));
            if !(self.release(first) && self.release(third)) {
                return;
            }
            self.println(format_args!("  Freed all blocks"));
            self.println(format_args!("Memory test completed!"));
        } else {
            for ptr in [first, second, third].into_iter().flatten() {
                self.release(ptr);
            }
            self.println(format_args!("  Memory allocation failed!"));
        }
    }

    /// Frees `ptr`, reporting a rejected free on the output.
    fn release(&self, ptr: HeapPtr) -> bool {
        match self.heap.free(ptr) {
            Ok(()) => true,
            Err(error) => {
                self.println(format_args!("free failed: {}", error));
                false
            }
        }
    }

    fn alloc(&self, command: &Command) {
        let Some(size) = command.arg(0).and_then(parse_number) else {
            self.println(format_args!("Usage: alloc <bytes>"));
            return;
        };
        match self.heap.allocate(size) {
            Some(ptr) => self.println(format_args!(
                "Allocated {} bytes at 0x{:x}",
                size,
                ptr.offset()
            )),
            None => self.println(format_args!("Out of memory")),
        }
    }

    fn free(&self, command: &Command) {
        let Some(offset) = command.arg(0).and_then(parse_number) else {
            self.println(format_args!("Usage: free <offset>"));
            return;
        };
        if self.release(HeapPtr::from_offset(offset)) {
            self.println(format_args!("Freed block at 0x{:x}", offset));
        }
    }

    fn dump(&self) {
        let guard = self.heap.lock();
        let Some(heap) = guard.as_ref() else {
            self.println(format_args!("Heap not initialized"));
            return;
        };

        self.println(format_args!("Block chain:"));
        let mut writer = SinkWriter { sink: self.out };
        let _ = heap.write_layout(&mut writer);
        match heap.check() {
            Ok(()) => self.println(format_args!("Heap consistent")),
            Err(error) => self.println(format_args!("Heap corrupted: {}", error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_reader::tests::{Screen, Script};
    use heap::HEADER_SIZE;
    use std::string::String;
    use std::vec;

    fn run_lines(heap: &LockedHeap, lines: &str) -> String {
        let screen = Screen::default();
        let config = ShellConfig {
            echo_input: false,
            ..ShellConfig::DEFAULT
        };
        let mut shell = Shell::new(heap, &screen, &config);
        for line in lines.lines() {
            shell.execute(line);
        }
        screen.text()
    }

    #[test]
    fn help_lists_commands() {
        let heap = LockedHeap::new();

        let output = run_lines(&heap, "help");

        assert!(output.starts_with("Available commands:\n"));
        for name in ["help", "mem", "test", "echo", "alloc", "free", "heap"] {
            assert!(output.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn mem_reports_heap_statistics() {
        let mut memory = vec![0u8; 4096];
        let heap = LockedHeap::new();
        heap.init(&mut memory).unwrap();
        let total = heap.stats().total;

        let output = run_lines(&heap, "mem");

        assert!(output.contains(&format!("  Total: {} bytes\n", total)));
        assert!(output.contains(&format!("  Used:  {} bytes\n", HEADER_SIZE)));
        assert!(output.contains(&format!("  Free:  {} bytes\n", total - HEADER_SIZE)));
        assert!(output.contains("  Blocks: 1\n"));
    }

    #[test]
    fn test_command_leaves_heap_as_it_found_it() {
        let mut memory = vec![0u8; 4096];
        let heap = LockedHeap::new();
        heap.init(&mut memory).unwrap();
        let before = heap.stats();

        let output = run_lines(&heap, "test");

        assert!(output.contains("  Allocated 3 blocks successfully\n"));
        assert!(output.contains("Memory test completed!\n"));
        assert_eq!(heap.stats(), before);
    }

    #[test]
    fn test_command_reports_failure_on_small_heap() {
        let mut memory = vec![0u8; 256];
        let heap = LockedHeap::new();
        heap.init(&mut memory).unwrap();
        let before = heap.stats();

        let output = run_lines(&heap, "test");

        assert!(output.contains("  Memory allocation failed!\n"));
        assert_eq!(heap.stats(), before);
    }

    #[test]
    fn rejected_free_is_reported() {
        let heap = LockedHeap::new();
        let screen = Screen::default();
        let config = ShellConfig::DEFAULT;
        let shell = Shell::new(&heap, &screen, &config);

        assert!(!shell.release(HeapPtr::from_offset(16)));
        assert_eq!(screen.text(), "free failed: heap not initialized\n");
    }

    #[test]
    fn echo_prints_the_rest_of_the_line() {
        let heap = LockedHeap::new();

        let output = run_lines(&heap, "echo hello  world");

        assert_eq!(output, "hello  world\n");
    }

    #[test]
    fn alloc_then_free_round_trip() {
        let mut memory = vec![0u8; 4096];
        let heap = LockedHeap::new();
        heap.init(&mut memory).unwrap();

        let output = run_lines(&heap, "alloc 64\nfree 0x10\nfree 0x10");

        assert!(output.contains("Allocated 64 bytes at 0x10\n"));
        assert!(output.contains("Freed block at 0x10\n"));
        assert!(output.contains("free failed: block is already free\n"));
        assert_eq!(heap.stats().blocks, 1);
    }

    #[test]
    fn alloc_reports_out_of_memory_and_usage() {
        let mut memory = vec![0u8; 4096];
        let heap = LockedHeap::new();
        heap.init(&mut memory).unwrap();

        let output = run_lines(&heap, "alloc 100000\nalloc\nfree nowhere");

        assert!(output.contains("Out of memory\n"));
        assert!(output.contains("Usage: alloc <bytes>\n"));
        assert!(output.contains("Usage: free <offset>\n"));
    }

    #[test]
    fn heap_command_shows_chain_and_verdict() {
        let mut memory = vec![0u8; 4096];
        let heap = LockedHeap::new();
        heap.init(&mut memory).unwrap();

        let output = run_lines(&heap, "alloc 32\nheap");

        assert!(output.contains("Block chain:\n"));
        assert!(output.contains("32 bytes allocated\n"));
        assert!(output.contains("Heap consistent\n"));
    }

    #[test]
    fn heap_command_before_init() {
        let heap = LockedHeap::new();

        assert_eq!(run_lines(&heap, "heap"), "Heap not initialized\n");
    }

    #[test]
    fn unknown_command_is_reported() {
        let heap = LockedHeap::new();

        let output = run_lines(&heap, "format c:");

        assert_eq!(
            output,
            "Unknown command: format\nType 'help' for available commands.\n"
        );
    }

    #[test]
    fn run_prompts_until_input_is_exhausted() {
        let mut memory = vec![0u8; 4096];
        let heap = LockedHeap::new();
        heap.init(&mut memory).unwrap();
        let screen = Screen::default();
        let config = ShellConfig {
            banner: "welcome",
            ..ShellConfig::DEFAULT
        };
        let mut shell = Shell::new(&heap, &screen, &config);

        shell.run(&mut Script("echo hi\n\nbogus\n".chars()));

        assert_eq!(
            screen.text(),
            "welcome\n> echo hi\nhi\n> \n> bogus\nUnknown command: bogus\nType 'help' for available commands.\n> "
        );
    }
}
