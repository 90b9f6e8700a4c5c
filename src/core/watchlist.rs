/// Ordered list of watched tickers without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    tickers: Vec<String>,
}

impl Watchlist {
    /// Builds a watchlist, dropping blanks and repeated entries.
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for ticker in tickers {
            list.add(ticker.as_ref());
        }
        list
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker.trim())
    }

    /// Returns false if the ticker was blank or already present.
    pub fn add(&mut self, ticker: &str) -> bool {
        let ticker = ticker.trim();
        if ticker.is_empty() || self.contains(ticker) {
            return false;
        }
        self.tickers.push(ticker.to_string());
        true
    }

    pub fn remove(&mut self, ticker: &str) -> bool {
        let before = self.tickers.len();
        self.tickers.retain(|t| t != ticker.trim());
        self.tickers.len() != before
    }

    /// Swaps `from` for the symbol it resolved to, keeping its position.
    /// If `to` is already watched, `from` is dropped instead.
    pub fn canonicalize(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        let Some(index) = self.tickers.iter().position(|t| t == from) else {
            return false;
        };
        if self.contains(to) {
            self.tickers.remove(index);
        } else {
            self.tickers[index] = to.to_string();
        }
        true
    }
}
