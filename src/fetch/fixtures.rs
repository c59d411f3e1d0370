// src/fetch/fixtures.rs
//! Built-in CSV payloads used in degraded mode when a source cannot be
//! reached. Sources opt in by naming one of these in their config.

pub const FAMILLE: &str = "\
Famille,CA N,CA N-1,Evolution,Marge N,Marge %
Accessoires,15200,12500,21.60 %,5100,33.55 %
Textile,45300,46100,-1.74 %,15200,33.55 %
Chaussures,32100,28400,13.03 %,11800,36.76 %
Equipement,8500,7900,7.59 %,2800,32.94 %
Nutrition,4200,3800,10.53 %,1400,33.33 %";

pub const HIT_PARADE: &str = "\
Code,Libelle,Fournisseur,CA N,Qte N,Evolution
1001,T-Shirt Run,Nike,5200,260,12.5%
1002,Short Basic,Adidas,4800,240,5.2%
1003,Chaussettes x3,Puma,1500,300,-2.0%
1004,Veste Pluie,Kipsta,3200,80,15.0%
1005,Baskets City,Reebok,6500,110,8.4%";

pub const FOURNISSEURS: &str = "\
Fournisseur,CA N,CA N-1,Evolution,Part %
Nike,58000,52000,11.54 %,35.0 %
Adidas,42000,43500,-3.45 %,25.4 %
Puma,25000,22000,13.64 %,15.1 %
Asics,18000,15000,20.00 %,10.9 %
Autres,22500,21000,7.14 %,13.6 %";

pub const TOP10_HOUDEMONT: &str = "\
Période : 2024-03
,,,,
Nomenclature 01 - TEXTILE HOMME
Magasin Houdemont - Quantité (Top 10)
Rang,Code,Libellé,Fournisseur,Quantité,CA
1,1001,T-Shirt Run,Nike,150,4500
2,1002,Short Basic,Adidas,120,3600
3,1003,Veste Pluie,Kipsta,80,2400
4,1004,Chaussettes,Puma,200,1200
5,1005,Pantalon,Reebok,70,2800
,,,,
Magasin Houdemont - Montant (Top 10)
Rang,Code,Libellé,Fournisseur,CA,Marge
1,1001,T-Shirt Run,Nike,4500,2000
2,1002,Short Basic,Adidas,3600,1500
3,1005,Pantalon,Reebok,2800,1200
4,1003,Veste Pluie,Kipsta,2400,1000
5,1004,Chaussettes,Puma,1200,600
,,,,
Nomenclature 02 - CHAUSSURES
Magasin Houdemont - Quantité (Top 10)
Rang,Code,Libellé,Fournisseur,Quantité,CA
1,2001,Pegasus,Nike,60,7200
2,2002,Ultraboost,Adidas,45,8100
3,2003,Trail Glove,Merrell,30,3600
,,,,
Magasin Houdemont - Montant (Top 10)
Rang,Code,Libellé,Fournisseur,CA,Marge
1,2002,Ultraboost,Adidas,8100,3000
2,2001,Pegasus,Nike,7200,2500
3,2003,Trail Glove,Merrell,3600,1200";

pub const TOP10_FROUARD: &str = "\
Période : 2024-03
,,,,
Nomenclature 01 - TEXTILE HOMME
Magasin Frouard - Quantité (Top 10)
Rang,Code,Libellé,Fournisseur,Quantité,CA
1,1001,T-Shirt Run,Nike,180,5400
2,1004,Chaussettes,Puma,250,1500
3,1002,Short Basic,Adidas,100,3000
,,,,
Magasin Frouard - Montant (Top 10)
Rang,Code,Libellé,Fournisseur,CA,Marge
1,1001,T-Shirt Run,Nike,5400,2400
2,1002,Short Basic,Adidas,3000,1200
3,1004,Chaussettes,Puma,1500,700
,,,,
Nomenclature 02 - CHAUSSURES
Magasin Frouard - Quantité (Top 10)
Rang,Code,Libellé,Fournisseur,Quantité,CA
1,2001,Pegasus,Nike,50,6000
2,2002,Ultraboost,Adidas,40,7200
,,,,
Magasin Frouard - Montant (Top 10)
Rang,Code,Libellé,Fournisseur,CA,Marge
1,2002,Ultraboost,Adidas,7200,2800
2,2001,Pegasus,Nike,6000,2000";

/// Look a fixture up by its config name, ignoring case.
pub fn by_name(name: &str) -> Option<&'static str> {
    match name.trim().to_lowercase().as_str() {
        "famille" => Some(FAMILLE),
        "hit_parade" => Some(HIT_PARADE),
        "fournisseurs" => Some(FOURNISSEURS),
        "top10_houdemont" => Some(TOP10_HOUDEMONT),
        "top10_frouard" => Some(TOP10_FROUARD),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{blocks::extract_report, records::Table, BlockRules};

    #[test]
    fn lookup() {
        assert_eq!(by_name("FAMILLE"), Some(FAMILLE));
        assert_eq!(by_name(" top10_frouard "), Some(TOP10_FROUARD));
        assert_eq!(by_name("nope"), None);
    }

    #[test]
    fn flat_fixtures_build_tables() {
        let t = Table::from_csv(FOURNISSEURS);
        assert_eq!(t.headers.len(), 5);
        assert_eq!(t.records.len(), 5);
        assert_eq!(t.records[1].get("Evolution"), Some("-3.45 %"));
    }

    #[test]
    fn houdemont_fixture_extracts() {
        let m = crate::process::parse_matrix(TOP10_HOUDEMONT);
        let report = extract_report(&m, &BlockRules::default());
        assert_eq!(report.period_label.as_deref(), Some("Période : 2024-03"));
        assert_eq!(report.groups.len(), 2);

        let textile = &report.groups[0];
        assert_eq!(textile.name, "Nomenclature 01 - TEXTILE HOMME");
        let qty = textile.quantity.as_ref().unwrap();
        assert_eq!(
            qty.headers,
            vec!["Rang", "Code", "Libellé", "Fournisseur", "Quantité", "CA"]
        );
        assert_eq!(qty.rows.len(), 5);
        assert_eq!(textile.amount.as_ref().unwrap().rows.len(), 5);

        let shoes = &report.groups[1];
        assert_eq!(shoes.quantity.as_ref().unwrap().rows.len(), 3);
        assert_eq!(shoes.amount.as_ref().unwrap().rows[0][2], "Ultraboost");
    }

    #[test]
    fn frouard_fixture_extracts() {
        let m = crate::process::parse_matrix(TOP10_FROUARD);
        let report = extract_report(&m, &BlockRules::default());
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[1].quantity.as_ref().unwrap().rows.len(), 2);
        assert_eq!(report.groups[1].amount.as_ref().unwrap().rows.len(), 2);
    }
}
