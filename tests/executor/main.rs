mod scan_test;
