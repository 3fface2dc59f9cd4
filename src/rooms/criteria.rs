//! Translation of a `RoomFilter` into a MongoDB query document.

use mongodb::bson::{Bson, DateTime, Document, Regex, doc};

use super::filter::{DateRange, RoomFilter};

/// Escape regex metacharacters so `text` matches literally.
pub fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' | '\\'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn contains_ignore_case(text: &str) -> Bson {
    Bson::RegularExpression(Regex {
        pattern: escape_regex(text),
        options: "i".to_string(),
    })
}

fn date_range(range: &DateRange) -> Option<Document> {
    let mut bounds = Document::new();
    if let Some(start) = range.start {
        bounds.insert("$gte", DateTime::from_millis(start.timestamp_millis()));
    }
    if let Some(end) = range.end {
        bounds.insert("$lte", DateTime::from_millis(end.timestamp_millis()));
    }
    (!bounds.is_empty()).then_some(bounds)
}

/// Build the query for omnichannel rooms matching `filter`.
///
/// `restriction` is the combined output of the restriction hooks; when not
/// empty it is AND-ed with the filter criteria.
pub fn rooms_query(filter: &RoomFilter, restriction: Document) -> Document {
    let mut query = doc! { "t": "l" };

    if let Some(agents) = filter.agents.as_ref().filter(|a| !a.is_empty()) {
        query.insert(
            "$or",
            vec![
                doc! { "servedBy._id": { "$in": agents.clone() } },
                doc! { "servedBy.username": { "$in": agents.clone() } },
            ],
        );
    }

    if let Some(name) = filter.room_name.as_deref().filter(|n| !n.is_empty()) {
        query.insert("fname", contains_ignore_case(name));
    }

    if let Some(department_id) = filter
        .department_id
        .as_deref()
        .filter(|id| !id.is_empty() && *id != "undefined")
    {
        query.insert("departmentId", department_id);
    }

    if let Some(open) = filter.open {
        query.insert("open", doc! { "$exists": open });
        query.insert("onHold", doc! { "$ne": true });
    }

    if let Some(bounds) = filter.created_at.as_ref().and_then(date_range) {
        query.insert("ts", bounds);
    }

    if let Some(bounds) = filter.closed_at.as_ref().and_then(date_range) {
        query.insert("closedAt", bounds);
    }

    if let Some(tags) = filter.tags.as_ref().filter(|t| !t.is_empty()) {
        query.insert("tags", doc! { "$in": tags.clone() });
    }

    if let Some(fields) = filter.custom_fields.as_ref().filter(|f| !f.is_empty()) {
        let mut keys: Vec<&String> = fields.keys().collect();
        keys.sort();
        let clauses: Vec<Document> = keys
            .into_iter()
            .map(|key| {
                let mut clause = Document::new();
                clause.insert(format!("livechatData.{key}"), contains_ignore_case(&fields[key]));
                clause
            })
            .collect();
        query.insert("$and", clauses);
    }

    if filter.onhold.as_ref().is_some_and(|h| h.is_set()) {
        query.insert("onHold", doc! { "$exists": true, "$eq": true });
    }

    if restriction.is_empty() {
        query
    } else {
        doc! { "$and": [query, restriction] }
    }
}
