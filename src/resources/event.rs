use crate::error::{ConsoleError, ConsoleResult};
use crate::model::ImageRef;
use crate::resource::{DraftFields, Editable, Resource};
use crate::transport::{Attachment, Endpoint, IMAGES_FIELD, MultipartPayload, RequestBody};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire form of event dates, as produced by a `datetime-local` input.
pub const FORM_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Parses `YYYY-MM-DDTHH:MM`, tolerating a seconds component.
pub fn parse_form_datetime(value: &str) -> ConsoleResult<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, FORM_DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| {
            ConsoleError::validation(format!(
                "`{value}` is not a date and time like 2024-06-01T10:00"
            ))
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "discountPercent")]
    pub discount: f64,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub discount: Option<f64>,
}

impl DraftFields for EventDraft {
    fn validate(&self) -> ConsoleResult<()> {
        if self.title.trim().is_empty() {
            return Err(ConsoleError::validation("Event title is required"));
        }
        let (Some(start), Some(end)) = (self.start_date, self.end_date) else {
            return Err(ConsoleError::validation("Start and end dates are required"));
        };
        if end < start {
            return Err(ConsoleError::validation(
                "End date must not be before the start date",
            ));
        }
        match self.discount {
            Some(discount) if (0.0..=100.0).contains(&discount) => Ok(()),
            Some(_) => Err(ConsoleError::validation(
                "Discount must be between 0 and 100",
            )),
            None => Err(ConsoleError::validation("Discount is required")),
        }
    }

    fn encode(&self, attachments: &[Attachment]) -> ConsoleResult<RequestBody> {
        let format_date = |date: Option<NaiveDateTime>| {
            date.map(|d| d.format(FORM_DATETIME_FORMAT).to_string())
                .unwrap_or_default()
        };
        let mut payload = MultipartPayload::new()
            .text("title", self.title.trim())
            .text("description", self.description.clone())
            .text("startDate", format_date(self.start_date))
            .text("endDate", format_date(self.end_date))
            .text("discount", self.discount.unwrap_or_default().to_string());
        for attachment in attachments {
            payload = payload.file(IMAGES_FIELD, attachment.clone());
        }
        Ok(RequestBody::Multipart(payload))
    }
}

pub struct Events;

impl Resource for Events {
    type Item = Event;
    type Draft = EventDraft;

    const NAME: &'static str = "events";
    const LABEL: &'static str = "Event";
    const COLLECTION_KEY: &'static str = "events";
    const ITEM_KEY: &'static str = "event";

    fn id_of(item: &Event) -> &str {
        &item.id
    }

    fn list_endpoint() -> Endpoint {
        Endpoint::post("/admin/events")
    }

    fn get_endpoint(id: &str) -> Option<Endpoint> {
        Some(Endpoint::get(format!("/admin/event/{id}")))
    }

    fn delete_endpoint(id: &str) -> Option<Endpoint> {
        Some(Endpoint::delete(format!("/admin/event/{id}")))
    }
}

impl Editable for Events {
    fn create_endpoint() -> Option<Endpoint> {
        Some(Endpoint::post("/admin/event/new"))
    }

    fn update_endpoint(id: &str) -> Endpoint {
        Endpoint::put(format!("/admin/event/{id}"))
    }

    fn hydrate(item: &Event) -> EventDraft {
        // Existing images are kept server-side; the draft starts with no uploads.
        EventDraft {
            title: item.title.clone(),
            description: item.description.clone(),
            start_date: item.start_date.map(|d| d.naive_utc()),
            end_date: item.end_date.map(|d| d.naive_utc()),
            discount: Some(item.discount),
        }
    }
}
