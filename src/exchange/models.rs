//! Wire types for the exchange REST API.

use serde::Deserialize;

/// Every endpoint wraps its payload in the same envelope.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub result: Option<T>,
}

/// One entry from the public markets endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketInfo {
    pub market_name: String,
    pub base_currency: String,
    pub market_currency: String,
    pub is_active: bool,
}

/// One entry from the public market-summaries endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketSummary {
    pub market_name: String,
    pub last: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub base_volume: Option<f64>,
}

/// One entry from the balances endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BalanceInfo {
    pub currency: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub available: f64,
}

/// Result payload of buy/sell order placement.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPlaced {
    pub uuid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_with_result() {
        let json = r#"{
            "success": true,
            "message": "",
            "result": [{"MarketName": "BTC-ABC", "Last": 0.00012, "Bid": 0.000119, "Ask": 0.000121, "BaseVolume": 4.2}]
        }"#;
        let parsed: ApiResponse<Vec<MarketSummary>> = serde_json::from_str(json).unwrap();
        assert!(parsed.success);
        let summaries = parsed.result.unwrap();
        assert_eq!(summaries[0].market_name, "BTC-ABC");
        assert_eq!(summaries[0].last, Some(0.00012));
    }

    #[test]
    fn test_envelope_failure() {
        let json = r#"{"success": false, "message": "INSUFFICIENT_FUNDS", "result": null}"#;
        let parsed: ApiResponse<OrderPlaced> = serde_json::from_str(json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.message, "INSUFFICIENT_FUNDS");
        assert!(parsed.result.is_none());
    }
}
