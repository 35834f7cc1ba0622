// Full-screen terminal console
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, stdout, Stdout, Write};
use std::time::Duration;
use zipmon_core::debugger::{Console, Screen};

/// Raw-mode alternate screen. The terminal is restored on drop, including
/// when the session ends with an error.
pub struct TerminalConsole {
    out: Stdout,
}

impl TerminalConsole {
    pub fn enter() -> io::Result<Self> {
        let mut out = stdout();
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        out.flush()?;
        Ok(Self { out })
    }
}

impl Drop for TerminalConsole {
    fn drop(&mut self) {
        let _ = crossterm::execute!(self.out, Show, LeaveAlternateScreen);
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Key character for a press event. Ctrl-C quits, since raw mode swallows
/// the signal.
fn key_char(key: KeyEvent) -> Option<char> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c' | 'C') if key.modifiers.contains(KeyModifiers::CONTROL) => Some('q'),
        KeyCode::Char(ch) => Some(ch),
        _ => None,
    }
}

impl Console for TerminalConsole {
    fn draw(&mut self, screen: &Screen) -> io::Result<()> {
        crossterm::queue!(self.out, MoveTo(0, 0), Clear(ClearType::All))?;
        for run in screen.runs() {
            crossterm::queue!(self.out, MoveTo(run.col, run.row))?;
            if run.bold {
                crossterm::queue!(
                    self.out,
                    SetAttribute(Attribute::Bold),
                    Print(&run.text),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                crossterm::queue!(self.out, Print(&run.text))?;
            }
        }
        self.out.flush()
    }

    fn clear(&mut self) -> io::Result<()> {
        crossterm::execute!(self.out, Clear(ClearType::All))
    }

    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<char>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(key_char(key)),
            _ => Ok(None),
        }
    }
}
