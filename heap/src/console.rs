use core::fmt::{self, Write};

use spin::Mutex;
use system::io::CharSink;

static CONSOLE: Mutex<Option<&'static dyn CharSink>> = Mutex::new(None);

struct ConsoleWriter {
    sink: &'static dyn CharSink,
}

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.sink.put_str(s);
        Ok(())
    }
}

pub fn setup_console(sink: &'static dyn CharSink) {
    *CONSOLE.lock() = Some(sink);
}

/// Output written before a console is set up is dropped.
#[doc(hidden)]
pub fn print(args: fmt::Arguments) {
    let sink = *CONSOLE.lock();
    if let Some(sink) = sink {
        let _ = ConsoleWriter { sink }.write_fmt(args);
    }
}

#[macro_export]
macro_rules! kprintln {
      () => ($crate::kprint!("\n"));
      ($($arg:tt)*) => ($crate::kprint!("{}\n", format_args!($($arg)*)));
  }

#[macro_export]
macro_rules! kprint {
      ($($arg:tt)*) => ($crate::console::print(format_args!($($arg)*)));
  }
