use std::collections::VecDeque;
use std::io::{self, Write};

use heap::console::setup_console;
use heap::{kprintln, LockedHeap};
use lazy_static::lazy_static;
use shell::{Shell, ShellConfig};
use system::io::{CharSink, CharSource};

const HEAP_SIZE: usize = 0x10_0000;

struct Stdout;

impl CharSink for Stdout {
    fn put_char(&self, c: char) {
        let mut buffer = [0; 4];
        self.put_str(c.encode_utf8(&mut buffer));
    }

    fn put_str(&self, s: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(s.as_bytes());
        let _ = out.flush();
    }
}

struct Stdin {
    pending: VecDeque<char>,
}

impl CharSource for Stdin {
    fn read_char(&mut self) -> Option<char> {
        if self.pending.is_empty() {
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => self.pending.extend(line.chars()),
            }
        }
        self.pending.pop_front()
    }
}

static STDOUT: Stdout = Stdout;

lazy_static! {
    static ref HEAP: LockedHeap<'static> = {
        let heap = LockedHeap::new();
        let region = Box::leak(vec![0u8; HEAP_SIZE].into_boxed_slice());
        if let Err(error) = heap.init(region) {
            kprintln!("[HEAP] Initialization failed: {}", error);
        }
        heap
    };
}

fn main() {
    setup_console(&STDOUT);

    let config = ShellConfig {
        echo_input: false,
        ..ShellConfig::DEFAULT
    };
    let mut shell = Shell::new(&HEAP, &STDOUT, &config);
    shell.run(&mut Stdin {
        pending: VecDeque::new(),
    });
    kprintln!();
}
