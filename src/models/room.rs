use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub branch_id: String,
    pub room_no: String,
    pub price_per_hour: f64,
    pub is_available: bool,
}
