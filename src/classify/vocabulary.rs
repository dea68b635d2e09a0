use serde::{Deserialize, Serialize};

/// Sales count key; drives the positive/negative tallies.
pub const SALES_KEY: &str = "vendas";
pub const TICKET_KEY: &str = "ticket_medio";
/// Gross value key; drives the revenue totals.
pub const GROSS_KEY: &str = "valor_bruto";
pub const NET_KEY: &str = "liquido";

/// Keyword lists used to read meaning into column names.
///
/// Matching is by substring on normalized text (trimmed, lowercased), so
/// `"Vendas (un.)"` hits `vendas`. Accented and unaccented spellings are
/// listed separately because sheet authors use both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Period words: the column holding one of these is the x-axis.
    pub label_keywords: Vec<String>,
    /// Quantity words: numeric columns holding one of these are metrics.
    pub metric_keywords: Vec<String>,
    /// Summary keys, in resolution order, each with its own narrower list.
    pub metric_keys: Vec<MetricKeySpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricKeySpec {
    pub key: String,
    pub keywords: Vec<String>,
}

impl MetricKeySpec {
    pub fn new(key: &str, keywords: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            keywords: strings(keywords),
        }
    }

    pub fn matches(&self, column_name: &str) -> bool {
        contains_any(&normalize(column_name), &self.keywords)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            label_keywords: strings(&[
                "mês", "mes", "month", "data", "date", "dia", "day", "período", "periodo",
                "period", "semana", "week",
            ]),
            metric_keywords: strings(&[
                "vendas",
                "sales",
                "pedidos",
                "orders",
                "ticket",
                "valor bruto",
                "bruto",
                "gross",
                "valor líquido",
                "líquido",
                "liquido",
                "net",
                "faturamento",
                "cancelamentos",
                "cancelamento",
                "cancellations",
                "visitas",
                "visits",
            ]),
            metric_keys: vec![
                MetricKeySpec::new(SALES_KEY, &["vendas", "sales", "pedidos", "orders"]),
                MetricKeySpec::new(
                    TICKET_KEY,
                    &["ticket médio", "ticket medio", "average ticket", "ticket"],
                ),
                MetricKeySpec::new(GROSS_KEY, &["valor bruto", "bruto", "gross", "faturamento"]),
                MetricKeySpec::new(NET_KEY, &["líquido", "liquido", "net", "receita líquida"]),
            ],
        }
    }
}

impl Vocabulary {
    pub fn is_label(&self, column_name: &str) -> bool {
        contains_any(&normalize(column_name), &self.label_keywords)
    }

    pub fn is_metric(&self, column_name: &str) -> bool {
        contains_any(&normalize(column_name), &self.metric_keywords)
    }

    pub fn metric_key(&self, key: &str) -> Option<&MetricKeySpec> {
        self.metric_keys.iter().find(|k| k.key == key)
    }
}

/// Trim and lowercase (Unicode-aware, so `"MÊS"` → `"mês"`).
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn contains_any(normalized_name: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .map(|k| normalize(k))
        .any(|k| !k.is_empty() && normalized_name.contains(&k))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
