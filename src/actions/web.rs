use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{ActionContext, ActionError, ActionRegistry, ActionResult, CommandHandler};
use crate::config::{self, ApiKey, ConfigError, ConfirmationSettings, RecognitionSettings};
use crate::confirm::wait_for_confirmation;
use crate::prompts::ask_single_entry;

pub const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
pub const WEATHERAPI_URL: &str = "http://api.weatherapi.com/v1/current.json";
pub const NINJAS_URL: &str = "https://api.api-ninjas.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Keys tried, in order, when pulling the text out of an API Ninjas reply
const NINJA_KEYS: &[&str] = &["joke", "quote", "fact", "riddle", "question", "item"];

fn http_client() -> Result<reqwest::blocking::Client, ActionError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Speak the right message when an API key is missing
fn api_key(
    ctx: &ActionContext<'_>,
    service: &'static str,
    key: &str,
    env_var: &str,
    signup: &str,
) -> Option<ApiKey> {
    match ApiKey::load(ctx.store, service, key, env_var) {
        Ok(api_key) => Some(api_key),
        Err(e @ ConfigError::MissingApiKey { .. }) => {
            println!("{}\nGo to {} to get your API key", e, signup);
            ctx.speak(&format!(
                "You have not set your API key yet! Fetch your API key from {} then add it to the configuration.",
                service
            ));
            None
        }
        Err(e) => {
            log::error!("❌ {}", e);
            None
        }
    }
}

/// `{"bitcoin": {"usd": 67000.5}}` -> 67000.5
pub fn parse_crypto_price(data: &Value, id: &str) -> Option<f64> {
    data.get(id)?.get("usd")?.as_f64()
}

pub fn fetch_crypto_price(id: &str) -> Result<f64, ActionError> {
    let data: Value = http_client()?
        .get(COINGECKO_URL)
        .query(&[("ids", id), ("vs_currencies", "usd")])
        .send()?
        .error_for_status()?
        .json()?;
    parse_crypto_price(&data, id)
        .ok_or_else(|| ActionError::Response(format!("no usd price for '{}'", id)))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn crypto_price(ctx: &mut ActionContext<'_>) -> ActionResult {
    let names = config::crypto_names(ctx.store);
    loop {
        let Some(crypto) = ask_single_entry(ctx, names.clone(), "crypto currency", true)? else {
            return Ok(None);
        };

        match fetch_crypto_price(&crypto) {
            Ok(price) => ctx.speak(&format!(
                "The current price of {} is {} US dollars.",
                capitalize(&crypto),
                price
            )),
            Err(e) => {
                log::warn!("⚠️ Crypto price lookup failed: {}", e);
                if ctx.network.is_online() {
                    return Ok(Some(
                        "I couldn't retrieve the price. Maybe the cryptocurrency name wasn't recognized."
                            .to_string(),
                    ));
                }
                return Ok(Some(
                    "There is no internet connection, command cannot be performed!".to_string(),
                ));
            }
        }

        ctx.speak("Would you like to know another crypto currency's price?");
        let settings = ConfirmationSettings::load(ctx.store);
        let echo = RecognitionSettings::load(ctx.store).print_input;
        if !wait_for_confirmation(ctx.listener, ctx.speaker, &settings, echo)? {
            return Ok(Some(
                "Okay, ending crypto currency price check. Is there anything else I can help you with?"
                    .to_string(),
            ));
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WeatherReply {
    pub current: CurrentWeather,
}

#[derive(Debug, Deserialize)]
pub struct CurrentWeather {
    pub temp_c: f64,
    pub humidity: f64,
    pub condition: WeatherCondition,
}

#[derive(Debug, Deserialize)]
pub struct WeatherCondition {
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorReply {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Spoken report for a weatherapi.com `current.json` reply
pub fn weather_report(city: &str, body: &str) -> Result<String, ActionError> {
    if let Ok(reply) = serde_json::from_str::<ApiErrorReply>(body) {
        return Err(ActionError::Response(reply.error.message));
    }
    let reply: WeatherReply = serde_json::from_str(body)
        .map_err(|e| ActionError::Response(format!("unexpected weather reply: {}", e)))?;
    Ok(format!(
        "The weather in {} is {}. The temperature is {} degrees Celsius with {} percent humidity.",
        title_case(city),
        reply.current.condition.text,
        reply.current.temp_c,
        reply.current.humidity
    ))
}

fn weather(ctx: &mut ActionContext<'_>) -> ActionResult {
    let cities = config::city_names(ctx.store);
    let Some(city) = ask_single_entry(ctx, cities, "city", true)? else {
        return Ok(None);
    };
    let Some(key) = api_key(ctx, "weather API", "weatherapi", "WEATHERAPI_KEY", "https://www.weatherapi.com/my/") else {
        return Ok(None);
    };

    let body = http_client()?
        .get(WEATHERAPI_URL)
        .query(&[("key", key.expose()), ("q", city.as_str()), ("aqi", "no")])
        .send()?
        .text()?;

    match weather_report(&city, &body) {
        Ok(report) => Ok(Some(report)),
        Err(e) => {
            log::error!("❌ Weather error: {}", e);
            Ok(Some(
                "I couldn't retrieve the information. Please check your API key.".to_string(),
            ))
        }
    }
}

/// Text of an API Ninjas reply; lists use their first element
pub fn ninja_text(data: &Value) -> Option<String> {
    let entry = match data {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let object = entry.as_object()?;
    NINJA_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .or_else(|| Some(entry.to_string()))
        .filter(|text| !text.trim().is_empty())
}

/// Handler speaking one result from an API Ninjas endpoint
struct Ninja(&'static str);

impl CommandHandler for Ninja {
    fn execute(&self, ctx: &mut ActionContext<'_>) -> ActionResult {
        let endpoint = self.0;
        let Some(key) = api_key(ctx, "Ninja API", "ninjasapi", "NINJAS_API_KEY", "https://api-ninjas.com/profile") else {
            return Ok(None);
        };

        let response = http_client()?
            .get(format!("{}/{}", NINJAS_URL, endpoint))
            .header("X-Api-Key", key.expose())
            .send()?;

        if !response.status().is_success() {
            log::error!("❌ {} returned {}", endpoint, response.status());
            return Ok(Some("There was an error fetching the data.".to_string()));
        }

        let data: Value = response.json()?;
        match ninja_text(&data) {
            Some(text) => Ok(Some(text)),
            None => Ok(Some(format!("Sorry, I couldn't find a {}.", endpoint))),
        }
    }
}

pub fn register(registry: &mut ActionRegistry) {
    registry.register("current crypto price", crypto_price);
    registry.register("whats todays weather", weather);
    registry.register("tell me a joke", Ninja("jokes"));
    registry.register("todays my last day", Ninja("bucketlist"));
}
