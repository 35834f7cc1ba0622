//! Screen layout for the debugger.
//!
//! A [`Screen`] is a list of positioned text runs with a bold attribute. The
//! layout follows a fixed 80-column grid:
//!
//! ```text
//! row  0      Peripherals                             CPU State: ...
//! rows 1-3     PIC : 0x........   WDT : 0x........ ...
//! row  5      Supervisor Registers
//! rows 6-9     sR0 : 0x........ ...            sCC :flags      sPC : 0x........
//! row  10     User Registers
//! rows 11-14   uR0 : 0x........ ...
//! rows 19-22  I : 0x........ 0x........  mnemonic
//! row  24     key help
//! ```
//!
//! The bank that is architecturally active is drawn bold and the other one
//! plain; pipeline words are bold while the supervisor bank is active.

use super::snapshot::{Reading, RegisterSnapshot, StageFetch};
use super::View;
use crate::regs::{Mode, Peripheral, RegisterId, REG_PC, REG_SP};

const COLUMNS: [u16; 4] = [1, 21, 41, 61];
const PERIPHERAL_ROW: u16 = 1;
const SUPERVISOR_ROW: u16 = 5;
const USER_ROW: u16 = 10;
const PIPELINE_ROW: u16 = 19;
const HELP_ROW: u16 = 24;

pub const HELP: &str = "(g)o  (q)uit  (r)eset  (s)tep";

/// One piece of text at a fixed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub row: u16,
    pub col: u16,
    pub text: String,
    pub bold: bool,
}

/// A full frame of the debugger display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Screen {
    runs: Vec<TextRun>,
}

fn value_text(reading: &Reading) -> String {
    match reading {
        Ok(value) => format!("0x{value:08x}"),
        Err(_) => "(bus err)".to_string(),
    }
}

impl Screen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, row: u16, col: u16, text: impl Into<String>, bold: bool) {
        self.runs.push(TextRun {
            row,
            col,
            text: text.into(),
            bold,
        });
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Plain text of one row, as it would appear on a terminal.
    pub fn row_text(&self, row: u16) -> String {
        let mut line: Vec<char> = Vec::new();
        for run in self.runs.iter().filter(|run| run.row == row) {
            let start = run.col as usize;
            for (i, ch) in run.text.chars().enumerate() {
                let at = start + i;
                if line.len() <= at {
                    line.resize(at + 1, ' ');
                }
                line[at] = ch;
            }
        }
        line.into_iter().collect::<String>().trim_end().to_string()
    }

    /// Whether any run containing `needle` is drawn bold.
    pub fn is_bold(&self, needle: &str) -> Option<bool> {
        self.runs
            .iter()
            .find(|run| run.text.contains(needle))
            .map(|run| run.bold)
    }

    pub fn from_view(view: &View) -> Self {
        match view {
            View::Running => Self::running(),
            View::Halted(snapshot) => Self::snapshot(snapshot),
        }
    }

    fn running() -> Self {
        let mut screen = Self::new();
        screen.put(0, 0, "CPU is running", false);
        screen.put(HELP_ROW, 0, HELP, false);
        screen
    }

    fn snapshot(snapshot: &RegisterSnapshot) -> Self {
        let mut screen = Self::new();

        screen.put(0, 0, "Peripherals", false);
        screen.put(
            0,
            40,
            format!("CPU State: {}", snapshot.status().describe()),
            false,
        );
        for (index, peripheral) in Peripheral::ALL.iter().enumerate() {
            let row = PERIPHERAL_ROW + (index / 4) as u16;
            let col = COLUMNS[index % 4];
            let reading = snapshot
                .peripherals
                .get(peripheral)
                .copied()
                .unwrap_or(Ok(0));
            screen.put(
                row,
                col,
                format!("{}: {}", peripheral.label(), value_text(&reading)),
                false,
            );
        }

        let user_active = snapshot.mode.is_user();
        screen.bank(snapshot, Mode::Supervisor, SUPERVISOR_ROW, !user_active);
        screen.bank(snapshot, Mode::User, USER_ROW, user_active);
        screen.pipeline(snapshot, !user_active);
        screen.put(HELP_ROW, 0, HELP, false);
        screen
    }

    fn bank(&mut self, snapshot: &RegisterSnapshot, mode: Mode, top: u16, bold: bool) {
        let title = match mode {
            Mode::Supervisor => "Supervisor Registers",
            Mode::User => "User Registers",
        };
        self.put(top, 0, title, bold);

        let bank = snapshot.bank(mode);
        for index in 0..=REG_SP {
            let row = top + 1 + (index / 4) as u16;
            let col = COLUMNS[(index % 4) as usize];
            let reg = RegisterId::active(mode, index);
            self.put(
                row,
                col,
                format!("{}: {}", reg.label(), value_text(&bank[index as usize])),
                bold,
            );
        }

        let last = top + 4;
        let cc = RegisterId::cc(mode);
        let flags = match snapshot.condition_codes(mode) {
            Some(cc) => cc.flags(),
            None => "(bus err)".to_string(),
        };
        self.put(last, COLUMNS[2], format!("{}:{flags}", cc.label()), bold);

        let pc = RegisterId::pc(mode);
        self.put(
            last,
            COLUMNS[3],
            format!("{}: {}", pc.label(), value_text(&bank[REG_PC as usize])),
            bold,
        );
    }

    fn pipeline(&mut self, snapshot: &RegisterSnapshot, bold: bool) {
        if snapshot.pipeline.is_empty() {
            self.put(PIPELINE_ROW, 0, "PC unavailable (Bus Error)", bold);
            return;
        }
        for (offset, stage) in snapshot.pipeline.iter().enumerate() {
            let row = PIPELINE_ROW + offset as u16;
            let head = format!("{}: 0x{:08x}", stage.stage.label(), stage.address);
            let col = head.len() as u16;
            self.put(row, 0, head, false);

            let body = match &stage.fetch {
                StageFetch::Word { word, mnemonic } => {
                    format!(" 0x{word:08x}  {:<24}", mnemonic.primary)
                }
                StageFetch::BusError { address } => {
                    format!(" 0x{address:08x}  {:<24}", "(Bus Error)")
                }
            };
            self.put(row, col, body, bold);
        }
    }
}
