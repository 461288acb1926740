//! Reply texts sent back to the chat.
//!
//! All user-facing strings live here so handlers stay free of formatting.

use chrono::NaiveDate;

/// Fixed reply texts
pub mod texts {
    pub const HELP: &str = "Hei, olen PatonkiBotti \n\
                            Komennot:\n\
                            /add [patonki]\n/del [numero]\n/list\n/delall\n/fact";
    pub const ADD_USAGE: &str = "Käytä: /add [patonki]";
    pub const DEL_USAGE: &str = "Käytä: /del [patonki numero]";
    pub const DEL_INVALID_NUMBER: &str = "Virheellinen numero! Käytä: /del [numero]";
    pub const DEL_OUT_OF_RANGE: &str = "Väärä patonki numero.";
    pub const NOT_PERMITTED: &str = "Nope!";
    pub const ALL_CLEARED: &str = "Kaikki patongit poistettu!";
    pub const NOTHING_TO_CLEAR: &str = "Ei patonkeja poistettavaksi.";
    pub const FACT_ALREADY_SERVED: &str = "Päivän fakta on jo jaettu! Yritä huomenna uudestaan. 🥖😱";
    pub const NO_FACTS: &str = "Ei löytynyt yhtään patonki-faktaa! 🥖😱";
    pub const INTERNAL_ERROR: &str = "Hups! Tapahtui virhe.";
}

/// Format a day the way the group writes dates.
pub fn format_day(day: NaiveDate) -> String {
    day.format("%d.%m.%Y").to_string()
}

pub fn added(labels: &[String], day: NaiveDate) -> String {
    format!("Lisättiin patongit: {} ({})", labels.join(", "), format_day(day))
}

pub fn removed(position: usize, label: &str) -> String {
    format!("Poistettiin patonki #{}: {}", position, label)
}

pub fn list(entries: &[(usize, String)], day: NaiveDate) -> String {
    if entries.is_empty() {
        return format!("Patongit ({}): Ei patonkeja :(", format_day(day));
    }
    let lines: Vec<String> = entries
        .iter()
        .map(|(position, label)| format!("{}. {}", position, label))
        .collect();
    format!("Patongit ({}):\n{}", format_day(day), lines.join("\n"))
}

pub fn fact(text: &str, day: NaiveDate) -> String {
    format!("Päivän fakta ({})🥖😱:\n{}", format_day(day), text)
}
