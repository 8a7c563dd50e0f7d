// Stopword lists for the two lemmatized languages.

use once_cell::sync::Lazy;
use std::collections::HashSet;

//English stopwords
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "but", "by", "ca", "call", "can", "cannot", "could", "did", "do", "does",
    "doing", "done", "down", "due", "during", "each", "either", "else", "elsewhere", "empty",
    "enough", "even", "ever", "every", "everyone", "everything", "everywhere", "except", "few",
    "for", "former", "formerly", "from", "further", "get", "give", "go", "had", "has", "have",
    "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hers", "herself", "him",
    "himself", "his", "how", "however", "i", "if", "in", "indeed", "into", "is", "it", "its",
    "itself", "just", "keep", "last", "latter", "latterly", "least", "less", "made", "make",
    "many", "may", "me", "meanwhile", "might", "mine", "more", "moreover", "most", "mostly",
    "much", "must", "my", "myself", "neither", "never", "nevertheless", "next", "no", "nobody",
    "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of", "off", "often", "on",
    "once", "one", "only", "onto", "or", "other", "others", "otherwise", "our", "ours",
    "ourselves", "out", "over", "own", "part", "per", "perhaps", "please", "put", "quite",
    "rather", "re", "really", "regarding", "same", "say", "see", "seem", "seemed", "seeming",
    "seems", "several", "she", "should", "show", "side", "since", "so", "some", "somehow",
    "someone", "something", "sometime", "sometimes", "somewhere", "still", "such", "take",
    "than", "that", "the", "their", "theirs", "them", "themselves", "then", "thence", "there",
    "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they", "this",
    "those", "though", "through", "throughout", "thru", "thus", "to", "together", "too", "top",
    "toward", "towards", "under", "unless", "until", "up", "upon", "us", "used", "using",
    "various", "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence",
    "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever",
    "whether", "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why",
    "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

//Italian stopwords
pub const ITALIAN_STOP_WORDS: &[&str] = &[
    "a", "abbia", "abbiamo", "abbiano", "ad", "agl", "agli", "ai", "al", "all", "alla", "alle",
    "allo", "anche", "avemmo", "avendo", "avesse", "avessero", "avete", "aveva", "avevano",
    "avevo", "avrà", "avrebbe", "avrei", "c", "che", "chi", "ci", "come", "con", "contro",
    "cui", "da", "dagl", "dagli", "dai", "dal", "dall", "dalla", "dalle", "dallo", "degl",
    "degli", "dei", "del", "dell", "della", "delle", "dello", "di", "dov", "dove", "e", "è",
    "ebbe", "ebbero", "ed", "era", "erano", "ero", "essendo", "fa", "fece", "fecero", "fosse",
    "fossero", "fu", "fui", "furono", "gli", "ha", "hai", "hanno", "ho", "i", "il", "in", "io",
    "l", "la", "le", "lei", "li", "lo", "loro", "lui", "ma", "mi", "mia", "mie", "miei", "mio",
    "ne", "negl", "negli", "nei", "nel", "nell", "nella", "nelle", "nello", "noi", "non",
    "nostra", "nostre", "nostri", "nostro", "o", "per", "perché", "più", "quale", "quanta",
    "quante", "quanti", "quanto", "quella", "quelle", "quelli", "quello", "questa", "queste",
    "questi", "questo", "sarà", "sarebbe", "sei", "si", "sia", "siamo", "siete", "sono", "sta",
    "stata", "state", "stati", "stato", "stesso", "su", "sua", "sue", "sugl", "sugli", "sui",
    "sul", "sull", "sulla", "sulle", "sullo", "suo", "suoi", "ti", "tra", "tu", "tua", "tue",
    "tuo", "tuoi", "tutti", "tutto", "un", "una", "uno", "vi", "voi", "vostra", "vostre",
    "vostri", "vostro",
];

/// Extra Italian function words and fillers removed from the corpus on top of
/// [`ITALIAN_STOP_WORDS`].
pub const CUSTOM_ITALIAN_STOP_WORDS: &[&str] = &[
    "il", "lo", "la", "i", "gli", "le", "un", "uno", "una", "di", "a", "da", "in", "con", "su",
    "per", "tra", "fra", "e", "o", "ma", "se", "che", "non", "si", "ciò", "cui", "né", "mi",
    "ti", "ci", "vi", "ne", "ed", "ad", "del", "al", "dal", "nel", "col", "sul", "dello",
    "allo", "dallo", "nello", "nella", "sullo", "sulla", "dei", "ai", "dai", "nei", "coi",
    "sui", "degli", "agli", "dagli", "negli", "sugli", "della", "alla", "dalla", "colla",
    "delle", "alle", "dalle", "nelle", "colle", "sulle", "essere", "avere", "fare", "dire",
    "potere", "volere", "dovere", "andare", "venire", "sapere", "vedere", "questo", "quello",
    "codesto", "tale", "quale", "stesso", "medesimo", "io", "tu", "lui", "lei", "noi", "voi",
    "loro", "egli", "ella", "essi", "esse", "mio", "tuo", "suo", "nostro", "vostro", "ancora",
    "sempre", "anche", "pure", "allora", "quindi", "infatti", "però", "tuttavia", "mentre",
    "quando", "molto", "poco", "tanto", "troppo", "più", "meno", "ogni", "alcuni", "nessuno",
    "cosa", "fatto", "esempio", "caso", "parte", "punto", "modo", "tempo", "giorno", "anno",
    "uomo", "donna", "ah", "oh", "eh", "mah", "boh",
];

pub static ENGLISH: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

pub static ITALIAN: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ITALIAN_STOP_WORDS.iter().copied().collect());

/// Checked against both the token and its lemma.
pub static CUSTOM_ITALIAN: Lazy<HashSet<&'static str>> =
    Lazy::new(|| CUSTOM_ITALIAN_STOP_WORDS.iter().copied().collect());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_italian_sets() {
        assert!(ITALIAN.contains("perché"));
        assert!(CUSTOM_ITALIAN.contains("medesimo"));
        assert!(CUSTOM_ITALIAN.contains("boh"));
        assert!(!ITALIAN.contains("guerra"));
        assert!(!CUSTOM_ITALIAN.contains("guerra"));
    }

    #[test]
    fn test_english_set() {
        assert!(ENGLISH.contains("the"));
        assert!(!ENGLISH.contains("war"));
    }
}
