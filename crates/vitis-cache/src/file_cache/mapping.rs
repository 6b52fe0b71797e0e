//! Static endpoint to flat-file mapping.

/// Files backing one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct EndpointFiles {
    pub endpoint: &'static str,
    pub default_file: &'static str,
    pub sub_options: &'static [(&'static str, &'static str)],
}

impl EndpointFiles {
    /// File for a sub-option, or the default file when it is absent or unknown.
    pub fn file_for(&self, sub_option: Option<&str>) -> &'static str {
        sub_option
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| {
                self.sub_options
                    .iter()
                    .find(|(name, _)| *name == s)
                    .map(|(_, file)| *file)
            })
            .unwrap_or(self.default_file)
    }

    /// Every distinct file this endpoint can resolve to, default first.
    pub fn files(&self) -> Vec<&'static str> {
        let mut files = vec![self.default_file];
        for (_, file) in self.sub_options {
            if !files.contains(file) {
                files.push(file);
            }
        }
        files
    }
}

pub type EndpointMapping = &'static [EndpointFiles];

pub static ENDPOINT_FILES: &[EndpointFiles] = &[
    EndpointFiles {
        endpoint: "producao",
        default_file: "Producao.csv",
        sub_options: &[
            ("VINHO DE MESA", "Producao.csv"),
            ("VINHO FINO DE MESA (VINIFERA)", "Producao.csv"),
            ("SUCO DE UVA", "Producao.csv"),
            ("DERIVADOS", "Producao.csv"),
        ],
    },
    EndpointFiles {
        endpoint: "processamento",
        default_file: "ProcessaViniferas.csv",
        sub_options: &[
            ("viniferas", "ProcessaViniferas.csv"),
            ("americanas", "ProcessaAmericanas.csv"),
            ("mesa", "ProcessaMesa.csv"),
            ("semclass", "ProcessaSemclass.csv"),
        ],
    },
    EndpointFiles {
        endpoint: "comercializacao",
        default_file: "Comercio.csv",
        sub_options: &[
            ("VINHO DE MESA", "Comercio.csv"),
            ("ESPUMANTES", "Comercio.csv"),
            ("UVAS FRESCAS", "Comercio.csv"),
            ("SUCO DE UVA", "Comercio.csv"),
        ],
    },
    EndpointFiles {
        endpoint: "importacao",
        default_file: "ImpVinhos.csv",
        sub_options: &[
            ("vinhos", "ImpVinhos.csv"),
            ("espumantes", "ImpEspumantes.csv"),
            ("frescas", "ImpFrescas.csv"),
            ("passas", "ImpPassas.csv"),
            ("suco", "ImpSuco.csv"),
        ],
    },
    EndpointFiles {
        endpoint: "exportacao",
        default_file: "ExpVinho.csv",
        sub_options: &[
            ("vinho", "ExpVinho.csv"),
            ("uva", "ExpUva.csv"),
            ("espumantes", "ExpEspumantes.csv"),
            ("suco", "ExpSuco.csv"),
        ],
    },
];

/// Endpoint names are matched trimmed and lowercased.
pub fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().to_lowercase()
}

pub fn find(mapping: EndpointMapping, endpoint: &str) -> Option<&'static EndpointFiles> {
    let endpoint = normalize_endpoint(endpoint);
    mapping.iter().find(|e| e.endpoint == endpoint)
}

pub fn known_endpoints(mapping: EndpointMapping) -> Vec<&'static str> {
    mapping.iter().map(|e| e.endpoint).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_option_resolution_falls_back_to_default() {
        let importacao = find(ENDPOINT_FILES, " Importacao ").unwrap();
        assert_eq!(importacao.file_for(Some("passas")), "ImpPassas.csv");
        assert_eq!(importacao.file_for(Some("unknown")), "ImpVinhos.csv");
        assert_eq!(importacao.file_for(Some("")), "ImpVinhos.csv");
        assert_eq!(importacao.file_for(None), "ImpVinhos.csv");
    }

    #[test]
    fn files_are_distinct() {
        let producao = find(ENDPOINT_FILES, "producao").unwrap();
        assert_eq!(producao.files(), vec!["Producao.csv"]);
        let exportacao = find(ENDPOINT_FILES, "exportacao").unwrap();
        assert_eq!(exportacao.files().len(), 4);
    }

    #[test]
    fn unknown_endpoint() {
        assert!(find(ENDPOINT_FILES, "vendas").is_none());
        assert_eq!(known_endpoints(ENDPOINT_FILES).len(), 5);
    }
}
