use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use config::ConfigError;
use derivative::Derivative;
use mongodb::bson::ser::Error as BsonError;
use mongodb::error::Error as DatabaseError;
use serde::{Serialize, Serializer};

use crate::campaign::CampaignId;

#[derive(Debug, Serialize, Derivative)]
#[derivative(PartialEq, Eq)]
#[serde(untagged)]
pub enum Error {
    // 400
    #[serde(serialize_with = "display")]
    InvalidJson(#[derivative(PartialEq = "ignore")] JsonPayloadError),
    #[serde(serialize_with = "display")]
    InvalidPath(#[derivative(PartialEq = "ignore")] PathError),
    #[serde(serialize_with = "display")]
    InvalidQuery(#[derivative(PartialEq = "ignore")] QueryPayloadError),
    MissingCampaignFields,
    NoValidRecipients,
    MissingGroupFields,
    InvalidSendMode {
        mode: String,
    },
    NoGroupRecipients {
        group_name: String,
    },

    // 401
    MissingCredentials,
    InvalidCredentials,

    // 403
    CampaignNotOwned {
        campaign_id: CampaignId,
    },

    // 404
    PathNotFound,
    CampaignNotFound {
        campaign_id: CampaignId,
    },
    GroupNotFound {
        group_name: String,
    },

    // 409
    GroupAlreadyExists {
        group_name: String,
    },
    DispatchInProgress {
        campaign_id: CampaignId,
    },

    // 500
    ExistentialState(String),
    InvalidConfig(String),
    GroupSendFailed {
        reason: String,
    },
    #[serde(serialize_with = "display")]
    FailedDatabaseCall(#[derivative(PartialEq = "ignore")] DatabaseError),
    #[serde(serialize_with = "display")]
    FailedToSerializeToBson(#[derivative(PartialEq = "ignore")] BsonError),
    #[serde(serialize_with = "display")]
    IoError(#[derivative(PartialEq = "ignore")] IoError),

    // 503
    TransportUnavailable {
        reason: String,
    },
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "E4001000",
            Error::InvalidPath(_) => "E4001001",
            Error::InvalidQuery(_) => "E4001002",
            Error::MissingCampaignFields => "E4001003",
            Error::NoValidRecipients => "E4001004",
            Error::MissingGroupFields => "E4001005",
            Error::InvalidSendMode { .. } => "E4001006",
            Error::NoGroupRecipients { .. } => "E4001007",
            Error::MissingCredentials => "E4011000",
            Error::InvalidCredentials => "E4011001",
            Error::CampaignNotOwned { .. } => "E4031000",
            Error::PathNotFound => "E4041000",
            Error::CampaignNotFound { .. } => "E4041001",
            Error::GroupNotFound { .. } => "E4041002",
            Error::GroupAlreadyExists { .. } => "E4091000",
            Error::DispatchInProgress { .. } => "E4091001",
            Error::ExistentialState(_) => "E5001000",
            Error::InvalidConfig(_) => "E5001001",
            Error::GroupSendFailed { .. } => "E5001002",
            Error::FailedDatabaseCall(_) => "E5001003",
            Error::FailedToSerializeToBson(_) => "E5001004",
            Error::IoError(_) => "E5001005",
            Error::TransportUnavailable { .. } => "E5031000",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "The given json could not be parsed",
            Error::InvalidPath(_) => "The given path could not be parsed",
            Error::InvalidQuery(_) => "The given query could not be parsed",
            Error::MissingCampaignFields => {
                "Subject, content, and non-empty recipients array required"
            }
            Error::NoValidRecipients => "None of the given recipients has an email address",
            Error::MissingGroupFields => "Group name, subject, and content are required",
            Error::InvalidSendMode { .. } => "Invalid mode. Use to, cc, or bcc",
            Error::NoGroupRecipients { .. } => "No recipients specified",
            Error::MissingCredentials => "Not authorized, no token",
            Error::InvalidCredentials => "Not authorized, token failed",
            Error::CampaignNotOwned { .. } => "The requested email job belongs to another user",
            Error::PathNotFound => "The requested path was not found",
            Error::CampaignNotFound { .. } => "The requested email job was not found",
            Error::GroupNotFound { .. } => "The requested group was not found",
            Error::GroupAlreadyExists { .. } => "A group with this name already exists",
            Error::DispatchInProgress { .. } => "The requested email job is already sending",
            Error::ExistentialState(_) => "The server detected an invalid state",
            Error::InvalidConfig(_) => "The server configuration is invalid",
            Error::GroupSendFailed { .. } => "Failed to send email",
            Error::FailedDatabaseCall(_) => {
                "An error occurred when communicating with the database"
            }
            Error::FailedToSerializeToBson(_) => {
                "An error occurred when serializing an object to bson"
            }
            Error::IoError(_) => "An error occurred during an I/O operation",
            Error::TransportUnavailable { .. } => "The mail server could not be reached",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::MissingCampaignFields => StatusCode::BAD_REQUEST,
            Error::NoValidRecipients => StatusCode::BAD_REQUEST,
            Error::MissingGroupFields => StatusCode::BAD_REQUEST,
            Error::InvalidSendMode { .. } => StatusCode::BAD_REQUEST,
            Error::NoGroupRecipients { .. } => StatusCode::BAD_REQUEST,
            Error::MissingCredentials => StatusCode::UNAUTHORIZED,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::CampaignNotOwned { .. } => StatusCode::FORBIDDEN,
            Error::PathNotFound => StatusCode::NOT_FOUND,
            Error::CampaignNotFound { .. } => StatusCode::NOT_FOUND,
            Error::GroupNotFound { .. } => StatusCode::NOT_FOUND,
            Error::GroupAlreadyExists { .. } => StatusCode::CONFLICT,
            Error::DispatchInProgress { .. } => StatusCode::CONFLICT,
            Error::ExistentialState(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::GroupSendFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedDatabaseCall(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSerializeToBson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::TransportUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Dummy<'a> {
            success: bool,
            message: &'static str,
            error_code: &'static str,
            error_meta: &'a Error,
        }

        HttpResponse::build(self.status_code()).json(&Dummy {
            success: false,
            message: self.error_message(),
            error_code: self.error_code(),
            error_meta: self,
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Error {
        Error::FailedDatabaseCall(error)
    }
}

impl From<BsonError> for Error {
    fn from(error: BsonError) -> Error {
        Error::FailedToSerializeToBson(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Error {
        Error::InvalidConfig(error.to_string())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(err) => Some(err),
            Error::InvalidPath(err) => Some(err),
            Error::InvalidQuery(err) => Some(err),
            Error::FailedDatabaseCall(err) => Some(err),
            Error::FailedToSerializeToBson(err) => Some(err),
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
