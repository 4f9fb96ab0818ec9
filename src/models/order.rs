use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fyers order type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,     // 1
    Market,    // 2
    Stop,      // 3: SL-M
    StopLimit, // 4: SL-L
}

impl OrderType {
    pub fn code(self) -> i8 {
        match self {
            OrderType::Limit => 1,
            OrderType::Market => 2,
            OrderType::Stop => 3,
            OrderType::StopLimit => 4,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(OrderType::Limit),
            2 => Some(OrderType::Market),
            3 => Some(OrderType::Stop),
            4 => Some(OrderType::StopLimit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,  // 1
    Sell, // -1
}

impl OrderSide {
    pub fn code(self) -> i8 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(OrderSide::Buy),
            -1 => Some(OrderSide::Sell),
            _ => None,
        }
    }
}

impl Serialize for OrderType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.code())
    }
}

impl<'de> Deserialize<'de> for OrderType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i8::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown order type {code}")))
    }
}

impl Serialize for OrderSide {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.code())
    }
}

impl<'de> Deserialize<'de> for OrderSide {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i8::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown order side {code}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductType {
    Cnc,
    Intraday,
    Margin,
    Co,
    Bo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Validity {
    Day,
    Ioc,
}

/// Order payload as accepted by `/orders/sync` and `/multi-order/sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub qty: u32,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub product_type: ProductType,
    #[serde(with = "rust_decimal::serde::float")]
    pub limit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub stop_price: Decimal,
    pub validity: Validity,
    pub disclosed_qty: u32,
    pub offline_order: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub stop_loss: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub take_profit: Decimal,
}

impl OrderRequest {
    /// Delivery (CNC) day limit order.
    pub fn limit(symbol: impl Into<String>, side: OrderSide, qty: u32, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            qty,
            order_type: OrderType::Limit,
            side,
            product_type: ProductType::Cnc,
            limit_price: price,
            stop_price: Decimal::ZERO,
            validity: Validity::Day,
            disclosed_qty: 0,
            offline_order: false,
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
        }
    }

    /// Delivery (CNC) day market order.
    pub fn market(symbol: impl Into<String>, side: OrderSide, qty: u32) -> Self {
        Self {
            order_type: OrderType::Market,
            ..Self::limit(symbol, side, qty, Decimal::ZERO)
        }
    }

    /// After-market order flag, for runs outside trading hours.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline_order = offline;
        self
    }

    /// qty × limit price; zero for market orders.
    pub fn notional(&self) -> Decimal {
        self.limit_price * Decimal::from(self.qty)
    }
}
