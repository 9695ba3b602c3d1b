/// Status são gravados como texto no banco com um rótulo canônico ("Ativo", "Paga" ...).
/// A entrada vinda de fora pode chegar com outra caixa ("ATIVO", "ativo"), então normalizamos
/// aqui, uma única vez, na fronteira de dados.
macro_rules! labelled_status {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let wanted = raw.trim().replace('_', " ");
                $name::ALL
                    .iter()
                    .copied()
                    .find(|status| status.label().eq_ignore_ascii_case(&wanted))
                    .ok_or_else(|| format!("status desconhecido: '{}'", raw))
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                raw.parse()
            }
        }

        impl From<$name> for &'static str {
            fn from(status: $name) -> Self {
                status.label()
            }
        }
    };
}

pub(crate) use labelled_status;

pub mod client;
pub mod collection;
pub mod ledger;
pub mod loan;
