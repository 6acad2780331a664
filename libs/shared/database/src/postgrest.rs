// libs/shared/database/src/postgrest.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_models::{Appointment, AvailabilityRule, DayOfWeek, DoctorProfile, TimeSlot};

use crate::store::{SchedulingStore, StoreError};

const TIME_FORMAT: &str = "%H:%M:%S";

/// PostgREST-backed store. The two multi-write units (`insert_appointment`
/// and `move_appointment`) go through RPC endpoints so the database commits
/// them as single transactions; a 409 from the uniqueness constraint maps
/// to `StoreError::UniqueViolation`.
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PostgrestStore {
    /// Fails if the HTTP client cannot be built, rather than falling back
    /// to a client without the configured timeout.
    pub fn new(config: &SchedulingConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.store_timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.store_url.clone(),
            api_key: config.store_api_key.clone(),
        })
    }

    fn headers(&self) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| StoreError::Unavailable(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("store request {} {}", method, url);

        let mut headers = self.headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Err(StoreError::UniqueViolation);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("store error ({}): {}", status, error_text);
            return Err(StoreError::Unavailable(format!(
                "{}: {}",
                status, error_text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Unavailable(format!("malformed store response: {}", e)))
    }

    async fn rows<T>(&self, path: &str) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, None, None).await
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}

#[async_trait]
impl SchedulingStore for PostgrestStore {
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let mut rows: Vec<Appointment> = self.rows(&path).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    async fn insert_appointment(
        &self,
        appointment: &Appointment,
    ) -> Result<Appointment, StoreError> {
        let body = json!({ "appointment": appointment });
        self.request(Method::POST, "/rest/v1/rpc/book_slot", Some(body), None)
            .await
    }

    async fn update_appointment(
        &self,
        appointment: &Appointment,
    ) -> Result<Appointment, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = serde_json::to_value(appointment)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut rows: Vec<Appointment> = self
            .request(
                Method::PATCH,
                &path,
                Some(body),
                Some(Self::representation_headers()),
            )
            .await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(rows.remove(0))
    }

    async fn move_appointment(
        &self,
        appointment: &Appointment,
        old_date: NaiveDate,
        old_time: NaiveTime,
    ) -> Result<Appointment, StoreError> {
        let body = json!({
            "appointment": appointment,
            "old_date": old_date,
            "old_time": old_time.format(TIME_FORMAT).to_string(),
        });
        self.request(Method::POST, "/rest/v1/rpc/move_slot", Some(body), None)
            .await
    }

    async fn doctor_appointments_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&order=appointment_time.asc",
            doctor_id, date
        );
        self.rows(&path).await
    }

    async fn patient_appointments_on(
        &self,
        patient_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&appointment_date=eq.{}&order=appointment_time.asc",
            patient_id, date
        );
        self.rows(&path).await
    }

    async fn doctor_appointments_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=gte.{}&appointment_date=lte.{}&order=appointment_date.asc",
            doctor_id, from, to
        );
        self.rows(&path).await
    }

    async fn approved_started_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        // Coarse filter on the date column; the exact start-instant check
        // needs both columns, so it happens here.
        let path = format!(
            "/rest/v1/appointments?status=eq.approved&appointment_date=lte.{}",
            cutoff.date_naive()
        );
        let mut rows: Vec<Appointment> = self.rows(&path).await?;
        rows.retain(|a| a.scheduled_start_time() <= cutoff);
        Ok(rows)
    }

    async fn availability_rules_for(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
    ) -> Result<Vec<AvailabilityRule>, StoreError> {
        let path = format!(
            "/rest/v1/availability_rules?doctor_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            doctor_id, day
        );
        self.rows(&path).await
    }

    async fn time_slot_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<TimeSlot>, StoreError> {
        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&slot_date=eq.{}&start_time=eq.{}",
            doctor_id,
            date,
            time.format(TIME_FORMAT)
        );
        let mut rows: Vec<TimeSlot> = self.rows(&path).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    async fn time_slots_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeSlot>, StoreError> {
        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&slot_date=gte.{}&slot_date=lte.{}&order=slot_date.asc,start_time.asc",
            doctor_id, from, to
        );
        self.rows(&path).await
    }

    async fn insert_time_slot(&self, slot: &TimeSlot) -> Result<bool, StoreError> {
        let body = serde_json::to_value(slot)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=ignore-duplicates,return=representation"),
        );
        let rows: Vec<Value> = self
            .request(Method::POST, "/rest/v1/time_slots", Some(body), Some(headers))
            .await?;
        // An empty representation means the row already existed.
        Ok(!rows.is_empty())
    }

    async fn update_time_slot(&self, slot: &TimeSlot) -> Result<TimeSlot, StoreError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}", slot.id);
        let body = serde_json::to_value(slot)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut rows: Vec<TimeSlot> = self
            .request(
                Method::PATCH,
                &path,
                Some(body),
                Some(Self::representation_headers()),
            )
            .await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(rows.remove(0))
    }

    async fn release_time_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<(), StoreError> {
        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&slot_date=eq.{}&start_time=eq.{}&is_blocked=eq.false",
            doctor_id,
            date,
            time.format(TIME_FORMAT)
        );
        let _: Vec<Value> = self
            .request(
                Method::PATCH,
                &path,
                Some(json!({ "is_available": true })),
                Some(Self::representation_headers()),
            )
            .await?;
        Ok(())
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>, StoreError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let mut rows: Vec<DoctorProfile> = self.rows(&path).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }
}
