//! Terminal colors for CLI output, mapped onto ANSI bright colors.

use colored::{ColoredString, Colorize};

pub trait Palette {
    fn danger(&self) -> ColoredString;
    fn ok(&self) -> ColoredString;
    fn caution(&self) -> ColoredString;
    fn key(&self) -> ColoredString;
    fn muted(&self) -> ColoredString;
}

impl<S: AsRef<str>> Palette for S {
    fn danger(&self) -> ColoredString {
        self.as_ref().bright_red()
    }

    fn ok(&self) -> ColoredString {
        self.as_ref().bright_green()
    }

    fn caution(&self) -> ColoredString {
        self.as_ref().bright_yellow()
    }

    fn key(&self) -> ColoredString {
        self.as_ref().bright_cyan()
    }

    // Dimmed grey for borders and secondary text
    fn muted(&self) -> ColoredString {
        self.as_ref().bright_black()
    }
}
