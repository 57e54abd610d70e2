//! Rider and driver reviews

use std::sync::{Arc, Mutex, MutexGuard};

use log::info;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{FleetError, Result};
use crate::store::{Clock, NumericInput};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing)]
    pub email: String,
    pub rating: f64,
    pub message: String,
    pub public: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Review as submitted, before validation
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub rating: Option<NumericInput>,
    #[serde(default)]
    pub message: String,
    /// Reviews are public unless told otherwise
    #[serde(default)]
    pub public: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub count: usize,
    pub average: f64,
}

pub struct ReviewBoard {
    reviews: Mutex<Vec<Review>>,
    clock: Arc<dyn Clock>,
}

impl ReviewBoard {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            reviews: Mutex::new(vec![]),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Review>>> {
        self.reviews
            .lock()
            .map_err(|_| FleetError::Internal("review board lock poisoned".to_string()))
    }

    pub fn add(&self, request: &ReviewRequest) -> Result<Review> {
        let name = required(&request.name, "name")?;
        let email = required(&request.email, "email")?;
        let message = required(&request.message, "message")?;
        let rating = match &request.rating {
            Some(r) => r.parse("rating")?,
            None => None,
        }
        .ok_or_else(|| FleetError::missing("rating"))?;
        if rating <= 0.0 || rating > 5.0 {
            return Err(FleetError::validation("rating", "must be within (0, 5]"));
        }

        let mut reviews = self.lock()?;
        let review = Review {
            id: reviews.len() as u64 + 1,
            name,
            email,
            rating,
            message,
            public: request.public != Some(false),
            created_at: self.clock.now(),
        };
        reviews.push(review.clone());

        info!("New review #{} ({} stars)", review.id, review.rating);

        Ok(review)
    }

    /// Public reviews, newest first
    pub fn list_public(&self) -> Result<Vec<Review>> {
        let reviews = self.lock()?;

        let mut public: Vec<Review> = reviews.iter().filter(|r| r.public).cloned().collect();
        public.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(public)
    }

    pub fn summary(&self) -> Result<ReviewSummary> {
        let reviews = self.lock()?;

        let (count, total) = reviews
            .iter()
            .filter(|r| r.public)
            .fold((0usize, 0f64), |(c, t), r| (c + 1, t + r.rating));

        Ok(ReviewSummary {
            count,
            average: if count > 0 { total / count as f64 } else { 0.0 },
        })
    }
}

fn required(value: &str, field: &'static str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FleetError::missing(field));
    }
    Ok(value.to_string())
}
