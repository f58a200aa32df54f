use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BrokerId, Cents};

pub type ListingId = Uuid;

/// A property advertised by a broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub broker_id: BrokerId,
    pub name: String,
    pub city: String,
    pub state: String,
    pub price_cents: Cents,
    pub description: String,
    /// Photo URLs, in display order
    pub photos: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(broker_id: BrokerId, name: impl Into<String>, price_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            broker_id,
            name: name.into(),
            city: String::new(),
            state: String::new(),
            price_cents,
            description: String::new(),
            photos: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_location(mut self, city: impl Into<String>, state: impl Into<String>) -> Self {
        self.city = city.into();
        self.state = state.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_photos(mut self, photos: Vec<String>) -> Self {
        self.photos = photos;
        self
    }
}
