mod live;

pub use live::{run_balance_refresh, run_market_refresh, run_ticker_feed};
