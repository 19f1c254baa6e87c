// Stable error codes surfaced to collaborators next to the message text.

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
    pub const MISSING_REQUIRED_FIELD: &str = "VALIDATION_1002";
    pub const GUARD_NOT_MET: &str = "VALIDATION_1003";
    pub const INVALID_TRANSITION: &str = "VALIDATION_1004";
}

pub mod conflict {
    pub const ITEM_ALREADY_CLAIMED: &str = "CONFLICT_2001";
    pub const ALREADY_BATCHED: &str = "CONFLICT_2002";
    pub const DUPLICATE_ENTRY: &str = "CONFLICT_2003";
}

pub mod state {
    pub const IMMUTABLE_CLAIM: &str = "STATE_3001";
    pub const IMMUTABLE_BATCH: &str = "STATE_3002";
    pub const LOCKED_TARIFF: &str = "STATE_3003";
}

pub mod lookup {
    pub const NOT_FOUND: &str = "LOOKUP_4001";
}

pub mod internal {
    pub const STORAGE_FAILURE: &str = "INTERNAL_5001";
    pub const AUDIT_LOG_FAILURE: &str = "INTERNAL_5002";
    pub const CONFIGURATION: &str = "INTERNAL_5003";
}
