use axum::{body::Bytes, Extension, Json};
use serde::{Deserialize, Deserializer};

use crate::{
    error::{Envelope, Error},
    subscriptions::Subscriptions,
};

/// Body of a subscribe request.
///
/// Absent and `null` fields are empty strings, so they fail validation as required.
#[derive(Default, Deserialize)]
pub(crate) struct SubscribeRequest {
    #[serde(
        default,
        alias = "Email",
        alias = "EMAIL",
        deserialize_with = "string_or_null"
    )]
    email: String,
    #[serde(
        default,
        rename = "clientToken",
        alias = "ClientToken",
        alias = "clienttoken",
        alias = "CLIENTTOKEN",
        deserialize_with = "string_or_null"
    )]
    client_token: String,
}

impl SubscribeRequest {
    /// Decode the first JSON value in `body`; anything after it is ignored.
    fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        let mut deserializer = serde_json::Deserializer::from_slice(body);
        let request = Option::<Self>::deserialize(&mut deserializer)?;
        Ok(request.unwrap_or_default())
    }
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[tracing::instrument(skip_all)]
pub(crate) async fn subscribe(
    Extension(subscriptions): Extension<Subscriptions>,
    body: Bytes,
) -> Result<Json<Envelope>, Error> {
    let request = SubscribeRequest::from_body(&body).map_err(Error::InvalidBody)?;

    subscriptions
        .subscribe(&request.email, &request.client_token)
        .await?;

    Ok(Json(Envelope::success(
        "Successfully subscribed to newsletter",
    )))
}
