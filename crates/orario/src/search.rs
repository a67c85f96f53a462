use serde::Serialize;

use crate::config::Roster;
use crate::types::Role;

/// Words that mark a request as a booking rather than a lookup
const BOOKING_KEYWORDS: &[&str] = &[
    "add", "book", "set", "new", "добавь", "запиши", "поставь", "назначь",
];

/// Russian name forms (including genitive) -> roster spelling
const NAME_FORMS: &[(&str, &str)] = &[
    ("адин", "Adina"),
    ("адина", "Adina"),
    ("адины", "Adina"),
    ("асель", "Assel"),
    ("багдан", "Bagdan"),
    ("дамир", "Damir"),
    ("диана", "Diana"),
    ("дианы", "Diana"),
    ("еркежан", "Erkezhan"),
    ("мадияр", "Madiyar"),
    ("полина", "Polina"),
    ("полины", "Polina"),
    ("раушан", "Raushan"),
    ("шапагат", "Shapagat"),
    ("тогжан", "Togzhan"),
    ("ернур", "Yernur"),
    ("кайсар", "Kaisar"),
    ("кайсара", "Kaisar"),
    ("мадина", "Madina"),
    ("мадины", "Madina"),
    ("аяжан", "Ayazhan"),
    ("жасмин", "Zhasmin"),
    ("зере", "Zere"),
    ("алуа", "Alua"),
    ("карима", "Karima"),
    ("султанали", "Sultanali"),
];

/// Whose schedule a search asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub person: String,
    pub role: Role,
}

/// Work out which person a free-text search refers to.
///
/// Teachers are checked before students, then Russian name forms. Returns
/// `None` for booking-style requests and for text that names nobody.
pub fn analyze_intent(text: &str, roster: &Roster) -> Option<Query> {
    let lower = text.to_lowercase();

    let is_booking = BOOKING_KEYWORDS.iter().any(|kw| lower.contains(kw));
    if is_booking && text.split_whitespace().count() > 2 {
        return None;
    }

    let named = |names: &[String]| {
        names
            .iter()
            .find(|name| !name.is_empty() && lower.contains(&name.to_lowercase()))
            .cloned()
    };

    if let Some(person) = named(&roster.teachers) {
        return Some(Query {
            person,
            role: Role::Teacher,
        });
    }
    if let Some(person) = named(&roster.students) {
        return Some(Query {
            person,
            role: Role::Student,
        });
    }

    NAME_FORMS
        .iter()
        .find(|(form, _)| lower.contains(form))
        .map(|(_, name)| Query {
            person: name.to_string(),
            role: if roster.is_teacher(name) {
                Role::Teacher
            } else {
                Role::Student
            },
        })
}
