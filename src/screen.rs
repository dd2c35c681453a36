//! Two-line LCD screens and PREV/NEXT browsing of the access log.

use core::fmt::Write;

use heapless::String;
use log::debug;

use super::access_log::LogRecord;
use super::peripherals::{CharacterDisplay, DateTime};

/// Presses closer together than this are ignored.
pub const DEBOUNCE_MS: u32 = 200;
/// Browsing ends after this long without a press.
pub const IDLE_TIMEOUT_MS: u32 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Prev,
    Next,
}

/// What the display should show after a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    NoLogs,
    /// Zero-based log slot.
    Entry(u16),
}

/// Short status messages, each at its own column on the first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    NoLogs,
    AlreadyLogged,
    CardLogged,
}

impl Message {
    pub fn text(self) -> &'static str {
        match self {
            Message::NoLogs => "No Logs Saved",
            Message::AlreadyLogged => "Already Logged",
            Message::CardLogged => "Card Logged!",
        }
    }

    fn column(self) -> u8 {
        match self {
            Message::NoLogs => 0,
            Message::AlreadyLogged => 1,
            Message::CardLogged => 2,
        }
    }
}

/// Button-driven cursor over the log. Time is passed in as a millisecond
/// tick that may wrap.
#[derive(Debug, Default)]
pub struct LogBrowser {
    index: Option<u16>,
    last_press_ms: Option<u32>,
    last_interaction_ms: u32,
    viewing: bool,
}

impl LogBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// While browsing, card scanning should pause.
    pub fn is_viewing(&self) -> bool {
        self.viewing
    }

    /// Handles a press when `total` records are stored. Returns `None` for a
    /// bounced press.
    pub fn press(&mut self, button: Button, now_ms: u32, total: u16) -> Option<View> {
        if let Some(last) = self.last_press_ms {
            if now_ms.wrapping_sub(last) <= DEBOUNCE_MS {
                return None;
            }
        }
        self.last_press_ms = Some(now_ms);
        self.last_interaction_ms = now_ms;

        if total == 0 {
            self.viewing = false;
            self.index = None;
            return Some(View::NoLogs);
        }

        let last = total - 1;
        let index = match (button, self.index) {
            (Button::Prev, None) => last,
            (Button::Prev, Some(0)) => last,
            (Button::Prev, Some(i)) => (i - 1).min(last),
            (Button::Next, None) => 0,
            (Button::Next, Some(i)) if i >= last => 0,
            (Button::Next, Some(i)) => i + 1,
        };
        self.index = Some(index);
        self.viewing = true;
        debug!("{:?} -> log entry {} of {}", button, index + 1, total);
        Some(View::Entry(index))
    }

    /// Returns `true` once when browsing has timed out and the scan screen
    /// should come back.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        if self.viewing && now_ms.wrapping_sub(self.last_interaction_ms) > IDLE_TIMEOUT_MS {
            self.viewing = false;
            self.index = None;
            return true;
        }
        false
    }
}

pub fn show_scan_screen<L: CharacterDisplay>(lcd: &mut L, now: &DateTime) {
    let mut time: String<16> = String::new();
    let _ = write!(time, "{:02}:{:02}:{:02}", now.hour, now.minute, now.second);
    lcd.clear();
    lcd.put_cursor(0, 0);
    lcd.send_string("Scan RFID Card..");
    lcd.put_cursor(1, 4);
    lcd.send_string(&time);
}

/// Slot `index` is shown one-based, with the first four UID bytes.
pub fn show_log_entry<L: CharacterDisplay>(lcd: &mut L, index: u16, record: &LogRecord) {
    let uid = &record.uid;
    let dt = &record.date_time;
    let mut line1: String<20> = String::new();
    let _ = write!(
        line1,
        "{}:{:02X}{:02X}{:02X}{:02X}",
        u32::from(index) + 1,
        uid[0],
        uid[1],
        uid[2],
        uid[3]
    );
    let mut line2: String<20> = String::new();
    let _ = write!(
        line2,
        "D:{:02}/{:02} T:{:02}:{:02}",
        dt.day, dt.month, dt.hour, dt.minute
    );

    lcd.clear();
    lcd.put_cursor(0, 0);
    lcd.send_string(&line1);
    lcd.put_cursor(1, 0);
    lcd.send_string(&line2);
}

pub fn show_message<L: CharacterDisplay>(lcd: &mut L, message: Message) {
    lcd.clear();
    lcd.put_cursor(0, message.column());
    lcd.send_string(message.text());
}
