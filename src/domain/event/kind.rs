//! Token event kinds

use std::fmt;

/// Broad category of an event kind, used to check that decoded fields agree
/// with the kind they were decoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindCategory {
    Transfer,
    Creation,
}

/// Token standard an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenStandard {
    Erc20,
    Erc721,
    Erc1155,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Erc20Transfer,
    Erc721Transfer,
    Erc1155Transfer,
    Erc20Mint,
    Erc721Mint,
    Erc1155Mint,
    NewErc20Contract,
    NewErc721Contract,
    NewErc1155Contract,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::Erc20Transfer,
        EventKind::Erc721Transfer,
        EventKind::Erc1155Transfer,
        EventKind::Erc20Mint,
        EventKind::Erc721Mint,
        EventKind::Erc1155Mint,
        EventKind::NewErc20Contract,
        EventKind::NewErc721Contract,
        EventKind::NewErc1155Contract,
    ];

    /// Stable label used in the toggle bar and in config files
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Erc20Transfer => "erc20Transfer",
            EventKind::Erc721Transfer => "erc721Transfer",
            EventKind::Erc1155Transfer => "erc1155Transfer",
            EventKind::Erc20Mint => "erc20Mint",
            EventKind::Erc721Mint => "erc721Mint",
            EventKind::Erc1155Mint => "erc1155Mint",
            EventKind::NewErc20Contract => "newErc20Contract",
            EventKind::NewErc721Contract => "newErc721Contract",
            EventKind::NewErc1155Contract => "newErc1155Contract",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.label().eq_ignore_ascii_case(label))
    }

    pub fn standard(&self) -> TokenStandard {
        match self {
            EventKind::Erc20Transfer | EventKind::Erc20Mint | EventKind::NewErc20Contract => {
                TokenStandard::Erc20
            }
            EventKind::Erc721Transfer | EventKind::Erc721Mint | EventKind::NewErc721Contract => {
                TokenStandard::Erc721
            }
            EventKind::Erc1155Transfer
            | EventKind::Erc1155Mint
            | EventKind::NewErc1155Contract => TokenStandard::Erc1155,
        }
    }

    pub fn category(&self) -> KindCategory {
        match self {
            EventKind::NewErc20Contract
            | EventKind::NewErc721Contract
            | EventKind::NewErc1155Contract => KindCategory::Creation,
            _ => KindCategory::Transfer,
        }
    }

    pub fn is_mint(&self) -> bool {
        matches!(
            self,
            EventKind::Erc20Mint | EventKind::Erc721Mint | EventKind::Erc1155Mint
        )
    }

    /// Transfer-family kind for a standard, picking the mint variant when the
    /// sender is the zero address.
    pub fn transfer(standard: TokenStandard, from_zero: bool) -> Self {
        match (standard, from_zero) {
            (TokenStandard::Erc20, false) => EventKind::Erc20Transfer,
            (TokenStandard::Erc20, true) => EventKind::Erc20Mint,
            (TokenStandard::Erc721, false) => EventKind::Erc721Transfer,
            (TokenStandard::Erc721, true) => EventKind::Erc721Mint,
            (TokenStandard::Erc1155, false) => EventKind::Erc1155Transfer,
            (TokenStandard::Erc1155, true) => EventKind::Erc1155Mint,
        }
    }

    pub fn new_contract(standard: TokenStandard) -> Self {
        match standard {
            TokenStandard::Erc20 => EventKind::NewErc20Contract,
            TokenStandard::Erc721 => EventKind::NewErc721Contract,
            TokenStandard::Erc1155 => EventKind::NewErc1155Contract,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::parse(kind.label()), Some(kind));
        }
        assert_eq!(EventKind::parse("ERC20MINT"), Some(EventKind::Erc20Mint));
        assert_eq!(EventKind::parse("newContract"), None);
    }

    #[test]
    fn test_categories() {
        assert_eq!(EventKind::Erc1155Mint.category(), KindCategory::Transfer);
        assert_eq!(
            EventKind::NewErc721Contract.category(),
            KindCategory::Creation
        );
        assert!(EventKind::transfer(TokenStandard::Erc721, true).is_mint());
        assert!(!EventKind::transfer(TokenStandard::Erc20, false).is_mint());
    }
}
