use crate::labels::ClassNames;
use crate::{Error, Result};
use std::fmt::{Display, Formatter};

/// `matrix[actual][predicted]` counts over a closed class set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub confusion: ConfusionMatrix,
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub total: usize,
}

impl ConfusionMatrix {
    pub fn new(classes: usize) -> Self {
        Self {
            matrix: vec![vec![0; classes]; classes],
        }
    }

    pub fn record(&mut self, actual: usize, predicted: usize) -> Result<()> {
        let n = self.matrix.len();
        if actual >= n || predicted >= n {
            return Err(Error::class_names(format!(
                "label pair ({actual}, {predicted}) outside {n} classes"
            )));
        }
        self.matrix[actual][predicted] += 1;
        Ok(())
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.matrix[actual][predicted]
    }

    pub fn classes(&self) -> usize {
        self.matrix.len()
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.matrix.len()).map(|i| self.matrix[i][i]).sum()
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    fn class_metrics(&self, class: usize) -> (f64, f64, f64, usize) {
        let n = self.matrix.len();
        let tp = self.matrix[class][class];
        let predicted: usize = (0..n).map(|i| self.matrix[i][class]).sum();
        let support: usize = self.matrix[class].iter().sum();

        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        (precision, recall, f1, support)
    }
}

impl EvaluationReport {
    pub fn new(confusion: ConfusionMatrix, classes: &ClassNames) -> Result<Self> {
        classes.check_width(confusion.classes())?;

        let per_class = classes
            .names()
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let (precision, recall, f1, support) = confusion.class_metrics(i);
                ClassMetrics {
                    name: name.clone(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect::<Vec<_>>();

        let total = confusion.total();
        let accuracy = ratio(confusion.correct(), total);
        let macro_f1 = if per_class.is_empty() {
            0.0
        } else {
            per_class.iter().map(|m| m.f1).sum::<f64>() / per_class.len() as f64
        };
        let weighted_f1 = if total == 0 {
            0.0
        } else {
            per_class
                .iter()
                .map(|m| m.f1 * m.support as f64)
                .sum::<f64>()
                / total as f64
        };

        Ok(Self {
            confusion,
            per_class,
            accuracy,
            macro_f1,
            weighted_f1,
            total,
        })
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl Display for EvaluationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let width = self
            .per_class
            .iter()
            .map(|m| m.name.len())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                m.name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.4} {:>9}",
            "accuracy", "", "", self.accuracy, self.total
        )?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.4} {:>9}",
            "macro avg", "", "", self.macro_f1, self.total
        )?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.4} {:>9}",
            "weighted avg", "", "", self.weighted_f1, self.total
        )?;

        writeln!(f)?;
        writeln!(f, "confusion matrix (rows: actual, columns: predicted)")?;
        for (m, row) in self.per_class.iter().zip(self.confusion.rows()) {
            let cells = row
                .iter()
                .map(|c| format!("{c:>6}"))
                .collect::<String>();
            writeln!(f, "{:>width$} {cells}", m.name)?;
        }
        Ok(())
    }
}
